//! 監査フォーム判定結果の WhatsApp 通知
//!
//! `auditoria_check` が保存したJSONを読み、新着または初回なら
//! `WHATSAPP_GROUP_ID` に送信する。
//!
//! 実行方法:
//! ```
//! cargo run --example notify_auditoria
//! ```

use tracing::info;

use portal_scraper::notify::{audit_message, NotifierConfig, WhatsAppNotifier};
use portal_scraper::{logging, AuditResult, ScraperError};

async fn run() -> Result<(), ScraperError> {
    let path = std::env::var("DADOS_ARQUIVO").unwrap_or_else(|_| "novo_formulario.json".into());
    let content = std::fs::read_to_string(&path)?;
    let result: AuditResult = serde_json::from_str(&content)?;

    let Some(text) = audit_message(&result) else {
        info!("Status {:?} does not require notification", result.report.status);
        return Ok(());
    };

    let group = std::env::var("WHATSAPP_GROUP_ID")
        .map_err(|_| ScraperError::Config("WHATSAPP_GROUP_ID が設定されていません".into()))?;
    let notifier = WhatsAppNotifier::new(NotifierConfig::from_env()?)?;
    notifier.send_text(&group, &text).await?;
    info!("Notification sent");
    Ok(())
}

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("notificar_auditoria", None) {
        eprintln!("{}", e);
    }

    if let Err(e) = run().await {
        tracing::error!("Notification failed: {}", e);
        std::process::exit(1);
    }
}
