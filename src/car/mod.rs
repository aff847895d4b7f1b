//! Calendário CAR スクレイパーモジュール
//!
//! 加盟店向けエクストラネットの入金予定カレンダーをCSコード別に取得する

mod scraper;
mod types;

pub use scraper::CarScraper;
pub use types::{CarConfig, CarExtraction, RawCarCalendar, RawCarDay, CS_CODES};
