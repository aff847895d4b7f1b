//! VIDIBR 監査フォームの新着チェック
//!
//! 結果を `DADOS_ARQUIVO`（既定 `novo_formulario.json`）に保存し、
//! `::{"outputs":{"resultado":...}}::` を標準出力に出す。
//!
//! 実行方法:
//! ```
//! cargo run --example auditoria_check
//! ```

use portal_scraper::{logging, AuditoriaConfig, FlowRequest, FlowService, RunEvent, ScraperConfig};
use tower::Service;

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("processar_auditoria", None) {
        eprintln!("{}", e);
    }

    let mut event = RunEvent::new("ProcessarAuditoria");
    event.info("Starting VIDIBR audit check...");

    let headed = std::env::args().any(|a| a == "--headed");
    let result = async {
        let config = AuditoriaConfig::from_env()?
            .with_scraper(ScraperConfig::new().with_headless(!headed));
        let output = FlowService::new().call(FlowRequest::from(config)).await?;
        let line = output.workflow_output()?;
        Ok::<_, portal_scraper::ScraperError>(line)
    }
    .await;

    match result {
        Ok(Some(line)) => {
            println!("{}", line);
            event.emit(true);
        }
        Ok(None) => {
            event.warning("No forms listed");
            event.emit(true);
        }
        Err(e) => {
            event.error(format!("Critical error: {}", e), Some(&e));
            event.emit(false);
            std::process::exit(1);
        }
    }
}
