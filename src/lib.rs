//! ポータルスクレイパーライブラリ
//!
//! - Mooz Cartões の入金カレンダー（加盟店別・当月/翌月）
//! - Calendário CAR の入金予定（CSコード別、過去日付のステータス補正付き）
//! - Portal Boletos の請求書一覧（当月1日〜翌月末日、全ページ）
//! - IAF ダッシュボードの本日更新チェック
//! - VIDIBR の監査フォーム新着検出（前回値カーソルと比較）
//! - Evolution API 経由の WhatsApp 通知
//!
//! # フローサービス使用例
//!
//! ```rust,ignore
//! use portal_scraper::{FlowRequest, FlowService, MoozConfig};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = FlowService::new();
//!
//!     let request = FlowRequest::from(MoozConfig::from_env().unwrap());
//!     let output = service.call(request).await.unwrap();
//!     println!("Saved: {:?}", output.path());
//! }
//! ```
//!
//! # 新着検出と通知
//!
//! ```rust,ignore
//! use portal_scraper::auditoria::{AuditoriaConfig, AuditoriaScraper};
//! use portal_scraper::cursor::FileCursorStore;
//! use portal_scraper::notify::{audit_message, NotifierConfig, WhatsAppNotifier};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AuditoriaConfig::from_env().unwrap();
//!     let store = FileCursorStore::new(&config.cursor_path);
//!
//!     let mut scraper = AuditoriaScraper::new(config);
//!     if let Some(result) = scraper.run_with_cursor(&store).await.unwrap() {
//!         if let Some(text) = audit_message(&result) {
//!             let notifier = WhatsAppNotifier::new(NotifierConfig::from_env().unwrap()).unwrap();
//!             notifier.send_text("120363000000000000@g.us", &text).await.unwrap();
//!         }
//!     }
//! }
//! ```

pub mod auditoria;
pub mod boletos;
pub mod browser;
pub mod calendar;
pub mod car;
pub mod config;
pub mod correction;
pub mod cursor;
pub mod error;
pub mod extranet;
pub mod iaf;
pub mod logging;
pub mod mooz;
pub mod normalize;
pub mod notify;
pub mod output;
pub mod record;
pub mod run_event;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{Credentials, ScraperConfig};
pub use error::ScraperError;
pub use service::{FlowOutput, FlowRequest, FlowService};
pub use traits::Scraper;

pub use auditoria::{AuditResult, AuditoriaConfig, AuditoriaScraper};
pub use boletos::{BoletosConfig, BoletosExtraction, BoletosScraper};
pub use car::{CarConfig, CarExtraction, CarScraper};
pub use iaf::{IafConfig, IafScraper, UpdateCheck};
pub use mooz::{MoozCalendar, MoozConfig, MoozScraper};

pub use calendar::{CalendarDayEntry, CalendarMonth, MonthStage};
pub use correction::StatusCorrection;
pub use cursor::{ChangeReport, ChangeStatus, CursorStore, FileCursorStore, MemoryCursorStore};
pub use record::{ScrapedRecord, NOT_AVAILABLE};
pub use run_event::RunEvent;
