//! Mooz Cartões 関連の型定義

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::{dedupe_current_month, CalendarCell, CalendarDayEntry, CalendarMonth};
use crate::config::{Credentials, ScraperConfig};
use crate::error::ScraperError;

const SELECT_BUTTON_PREFIX: &str = "select-button-";

/// Mooz スクレイパー設定
#[derive(Debug, Clone)]
pub struct MoozConfig {
    pub credentials: Credentials,
    pub scraper: ScraperConfig,
    /// 当月から何か月分抽出するか
    pub months: usize,
}

impl MoozConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            scraper: ScraperConfig::default(),
            months: 2,
        }
    }

    /// `LOGIN_MOOZCARTOES` / `PASS_MOOZCARTOES`
    pub fn from_env() -> Result<Self, ScraperError> {
        Ok(Self::new(Credentials::from_env(
            "LOGIN_MOOZCARTOES",
            "PASS_MOOZCARTOES",
        )?))
    }

    pub fn with_scraper(mut self, scraper: ScraperConfig) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_months(mut self, months: usize) -> Self {
        self.months = months.max(1);
        self
    }
}

/// ページから取り出したままのカレンダー
#[derive(Debug, Clone, Deserialize)]
pub struct RawCalendar {
    pub header: String,
    pub cells: Vec<CalendarCell>,
}

/// 1加盟店・1か月分の抽出結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoozCalendar {
    pub merchant_id: String,
    /// `Fevereiro/2026`
    pub period: String,
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDayEntry>,
    pub scraped_at: NaiveDateTime,
}

impl MoozCalendar {
    /// ヘッダーを解析し、当月分のセルだけを残す
    pub fn from_raw(
        merchant_id: &str,
        raw: &RawCalendar,
        scraped_at: NaiveDateTime,
    ) -> Result<Self, ScraperError> {
        let month = CalendarMonth::parse_header(&raw.header)?;
        let days = dedupe_current_month(&raw.cells, month)?;
        Ok(Self {
            merchant_id: merchant_id.to_string(),
            period: month.label(),
            year: month.year,
            month: month.month,
            days,
            scraped_at,
        })
    }

    pub fn total(&self) -> f64 {
        self.days.iter().map(|d| d.value_num).sum()
    }
}

/// `select-button-<id>` → `<id>`
pub fn merchant_id_from_testid(testid: &str) -> Option<&str> {
    testid
        .strip_prefix(SELECT_BUTTON_PREFIX)
        .filter(|id| !id.is_empty())
}

pub fn select_button_selector(merchant_id: &str) -> String {
    format!("button[data-testid='{}{}']", SELECT_BUTTON_PREFIX, merchant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn cell(day: u32, value: Option<&str>) -> CalendarCell {
        CalendarCell {
            day,
            status: value.map(|_| "Pago".to_string()),
            value: value.map(str::to_string),
            titulos: None,
            has_data: value.is_some(),
        }
    }

    #[test]
    fn test_from_raw_drops_overflow_days() {
        let raw = RawCalendar {
            header: "fevereiro 2026".into(),
            cells: vec![
                cell(30, Some("R$ 999,00")),
                cell(31, Some("R$ 999,00")),
                cell(1, Some("R$ 1.000,50")),
                cell(2, None),
                cell(3, Some("R$ 200,00")),
                cell(1, Some("R$ 999,00")),
            ],
        };

        let calendar = MoozCalendar::from_raw("4711", &raw, now()).unwrap();

        assert_eq!(calendar.period, "Fevereiro/2026");
        assert_eq!(calendar.month, 2);
        assert_eq!(calendar.days.len(), 2);
        assert_eq!(calendar.days[0].date, "2026-02-01");
        assert_eq!(calendar.days[1].date, "2026-02-03");
        assert!((calendar.total() - 1200.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_raw_bad_header() {
        let raw = RawCalendar {
            header: "".into(),
            cells: vec![],
        };
        assert!(matches!(
            MoozCalendar::from_raw("1", &raw, now()),
            Err(ScraperError::MalformedCalendar(_))
        ));
    }

    #[test]
    fn test_raw_calendar_deserializes_page_payload() {
        let json = r#"{"header":"março 2026","cells":[{"day":1,"status":"Previsto","value":"R$ 10,00","has_data":true},{"day":2,"status":null,"value":null,"has_data":false}]}"#;
        let raw: RawCalendar = serde_json::from_str(json).unwrap();
        assert_eq!(raw.cells.len(), 2);
        assert!(raw.cells[1].status.is_none());
    }

    #[test]
    fn test_merchant_id_from_testid() {
        assert_eq!(merchant_id_from_testid("select-button-123"), Some("123"));
        assert_eq!(merchant_id_from_testid("select-button-"), None);
        assert_eq!(merchant_id_from_testid("other-123"), None);
        assert_eq!(
            select_button_selector("123"),
            "button[data-testid='select-button-123']"
        );
    }
}
