//! Mooz Cartões 入金カレンダー抽出
//!
//! 実行方法:
//! ```
//! cargo run --example mooz_extract            # ヘッドレス
//! cargo run --example mooz_extract -- --headed
//! ```

use std::path::Path;

use portal_scraper::{logging, FlowRequest, FlowService, MoozConfig, RunEvent, ScraperConfig};
use tower::Service;

#[tokio::main]
async fn main() {
    portal_scraper::config::load_dotenv(".env").ok();
    if let Err(e) = logging::init("scrape_mooz", Some(Path::new("logs"))) {
        eprintln!("{}", e);
    }

    let mut event = RunEvent::new("ScrapeMoozService");
    event.info("Starting Mooz extraction...");

    let headed = std::env::args().any(|a| a == "--headed");
    let result = async {
        let config = MoozConfig::from_env()?
            .with_scraper(ScraperConfig::new().with_headless(!headed));
        FlowService::new().call(FlowRequest::from(config)).await
    }
    .await;

    match result {
        Ok(output) => {
            if let Some(path) = output.path() {
                event.add_context("output", path.display().to_string());
            }
            if let portal_scraper::FlowOutput::Mooz { calendars, .. } = &output {
                event.add_context("calendars", calendars.len());
                event.add_context(
                    "days",
                    calendars.iter().map(|c| c.days.len()).sum::<usize>(),
                );
            }
            event.info("Mooz extraction finished");
            event.emit(true);
        }
        Err(e) => {
            event.error(format!("Error in Mooz extraction: {}", e), Some(&e));
            event.emit(false);
            std::process::exit(1);
        }
    }
}
