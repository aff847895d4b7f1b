//! Portal Boletos モジュール
//!
//! エクストラネット経由で JP Morgan / Guasti の CNS 画面を開き、
//! 当月1日〜翌月末日が期限の請求書グリッドを全ページ取得する

mod scraper;
mod types;

pub use scraper::BoletosScraper;
pub use types::{
    clean_header, rows_to_records, BoletosConfig, BoletosExtraction, PagerCell, PagerInfo,
    RawGridPage,
};
