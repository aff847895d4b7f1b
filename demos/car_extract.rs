//! Calendário CAR 抽出
//!
//! 実行方法:
//! ```
//! cargo run --example car_extract
//! CAR_CS_CODES=13406 cargo run --example car_extract -- --headed
//! ```

use std::path::Path;

use portal_scraper::{
    logging, CarConfig, FlowOutput, FlowRequest, FlowService, RunEvent, ScraperConfig,
};
use tower::Service;

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("scrape_car", Some(Path::new("logs"))) {
        eprintln!("{}", e);
    }

    let mut event = RunEvent::new("ScrapeCarService");
    event.info("Starting CAR extraction...");

    let headed = std::env::args().any(|a| a == "--headed");
    let result = async {
        let config = CarConfig::from_env()?
            .with_scraper(ScraperConfig::new().with_headless(!headed));
        event.add_context("cs_codes", &config.cs_codes);
        FlowService::new().call(FlowRequest::from(config)).await
    }
    .await;

    match result {
        Ok(output) => {
            if let Some(path) = output.path() {
                event.add_context("output", path.display().to_string());
            }
            if let FlowOutput::Car { extractions, .. } = &output {
                event.add_context("total_extractions", extractions.len());
                event.add_context(
                    "corrected_statuses",
                    extractions.iter().map(|e| e.corrected_statuses).sum::<usize>(),
                );
            }
            event.info("CAR extraction finished");
            event.emit(true);
        }
        Err(e) => {
            event.error(format!("Error: {}", e), Some(&e));
            event.emit(false);
            std::process::exit(1);
        }
    }
}
