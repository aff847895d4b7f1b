//! IAF ダッシュボード更新チェックモジュール
//!
//! エクストラネットの IAF Consolidated に表示される「Data de atualização」が
//! 今日の日付かを判定する

mod scraper;
mod types;

pub use scraper::IafScraper;
pub use types::{parse_update_date, IafConfig, UpdateCheck};
