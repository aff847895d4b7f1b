//! Portal Boletos 抽出（当月1日〜翌月末日）
//!
//! 実行方法:
//! ```
//! cargo run --example boletos_extract
//! cargo run --example boletos_extract -- --headed
//! ```

use std::path::Path;

use portal_scraper::{
    logging, BoletosConfig, FlowOutput, FlowRequest, FlowService, RunEvent, ScraperConfig,
};
use tower::Service;

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("scrape_boletos", Some(Path::new("logs"))) {
        eprintln!("{}", e);
    }

    let mut event = RunEvent::new("ScrapeBoletosService");
    event.info("Starting Boletos extraction...");

    let headed = std::env::args().any(|a| a == "--headed");
    let result = async {
        let config = BoletosConfig::from_env()?
            .with_scraper(ScraperConfig::new().with_headless(!headed));
        FlowService::new().call(FlowRequest::from(config)).await
    }
    .await;

    match result {
        Ok(output) => {
            if let Some(path) = output.path() {
                event.add_context("output", path.display().to_string());
            }
            if let FlowOutput::Boletos { extraction, .. } = &output {
                event.add_context("start_date", &extraction.start_date);
                event.add_context("end_date", &extraction.end_date);
                event.add_context("pages", extraction.pages);
                event.add_context("rows", extraction.rows.len());
            }
            event.info("Boletos extraction finished");
            event.emit(true);
        }
        Err(e) => {
            event.error(format!("Error: {}", e), Some(&e));
            event.emit(false);
            std::process::exit(1);
        }
    }
}
