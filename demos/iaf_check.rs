//! IAF ダッシュボードの本日更新チェック
//!
//! 終了コード: 0 = 本日更新済み、1 = 未更新またはエラー。
//! 抽出・送信フローの前にポーリングで使う。
//!
//! 実行方法:
//! ```
//! cargo run --example iaf_check
//! ```

use portal_scraper::{
    logging, FlowOutput, FlowRequest, FlowService, IafConfig, RunEvent, ScraperConfig,
};
use tower::Service;

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("verificar_atualizacao_iaf", None) {
        eprintln!("{}", e);
    }

    let mut event = RunEvent::new("VerificarAtualizacaoIaf");
    event.info("Checking IAF dashboard update date...");

    let headed = std::env::args().any(|a| a == "--headed");
    let result = async {
        let config = IafConfig::from_env()?
            .with_scraper(ScraperConfig::new().with_headless(!headed));
        FlowService::new().call(FlowRequest::from(config)).await
    }
    .await;

    let code = match result {
        Ok(FlowOutput::Iaf { check }) => {
            event.add_context("data_atualizacao_raw", &check.raw);
            event.add_context("atualizado_hoje", check.updated_today);
            event.emit(true);
            check.exit_code()
        }
        Ok(_) => {
            event.warning("Unexpected flow output");
            event.emit(false);
            1
        }
        Err(e) => {
            event.error(format!("Error: {}", e), Some(&e));
            event.emit(false);
            1
        }
    };
    std::process::exit(code);
}
