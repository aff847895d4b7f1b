//! VIDIBR 監査フォームモジュール
//!
//! 実施済み監査の一覧から新着フォームを検出して詳細を取得する

mod scraper;
mod types;

pub use scraper::AuditoriaScraper;
pub use types::{form_names, AuditResult, AuditoriaConfig, RawDetail, DETAIL_FIELDS};
