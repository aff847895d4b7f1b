//! Mooz Cartões スクレイパーモジュール
//!
//! 加盟店ごとの入金カレンダー（当月・翌月）を取得する

mod scraper;
mod types;

pub use scraper::MoozScraper;
pub use types::{MoozCalendar, MoozConfig, RawCalendar};
