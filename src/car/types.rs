//! Calendário CAR 関連の型定義

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{month_name_pt, CalendarDayEntry, CalendarMonth};
use crate::config::{Credentials, ScraperConfig};
use crate::correction::{parse_day_date, StatusCorrection};
use crate::error::ScraperError;
use crate::normalize::parse_brl_opt;

/// 対象のCSコード
pub const CS_CODES: [&str; 4] = ["13406", "13408", "14056", "23107"];

/// 検索ボタンの最大試行回数
pub const MAX_SEARCH_ATTEMPTS: u32 = 3;

/// CAR スクレイパー設定
#[derive(Debug, Clone)]
pub struct CarConfig {
    pub credentials: Credentials,
    pub scraper: ScraperConfig,
    pub cs_codes: Vec<String>,
    pub correction: StatusCorrection,
    pub max_search_attempts: u32,
}

impl CarConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            scraper: ScraperConfig::default(),
            cs_codes: CS_CODES.iter().map(|c| c.to_string()).collect(),
            correction: StatusCorrection::default(),
            max_search_attempts: MAX_SEARCH_ATTEMPTS,
        }
    }

    /// `LOGIN_EXTRANET` / `PASS_EXTRANET`、任意で `CAR_CS_CODES`（カンマ区切り）
    pub fn from_env() -> Result<Self, ScraperError> {
        let mut config = Self::new(Credentials::from_env("LOGIN_EXTRANET", "PASS_EXTRANET")?);
        config.correction = StatusCorrection::from_env();
        if let Ok(codes) = std::env::var("CAR_CS_CODES") {
            let codes = parse_cs_codes(&codes);
            if !codes.is_empty() {
                config.cs_codes = codes;
            }
        }
        Ok(config)
    }

    pub fn with_scraper(mut self, scraper: ScraperConfig) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_cs_codes(mut self, codes: Vec<String>) -> Self {
        self.cs_codes = codes;
        self
    }

    pub fn with_correction(mut self, correction: StatusCorrection) -> Self {
        self.correction = correction;
        self
    }
}

pub fn parse_cs_codes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// ページから取り出した1日分（`date` は `DD-MM-YYYY`）
#[derive(Debug, Clone, Deserialize)]
pub struct RawCarDay {
    pub date: String,
    pub value: String,
    pub status: String,
    #[serde(default)]
    pub titulos: String,
}

/// ページから取り出したままのカレンダー
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCarCalendar {
    pub total_recebimentos: Option<String>,
    pub total_agendamentos: Option<String>,
    #[serde(default)]
    pub days: Vec<RawCarDay>,
}

/// CSコード × 月 の抽出結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarExtraction {
    pub cs_code: String,
    /// `Março`
    pub month: String,
    pub month_number: u32,
    pub year: i32,
    pub extraction_date: NaiveDateTime,
    pub total_recebimentos: Option<String>,
    pub total_agendamentos: Option<String>,
    pub total_recebimentos_num: f64,
    pub total_agendamentos_num: f64,
    pub days: Vec<CalendarDayEntry>,
    /// 補正したステータス数
    pub corrected_statuses: usize,
}

impl CarExtraction {
    /// 数値化とステータス補正を行う（基準日は抽出日）
    pub fn from_raw(
        cs_code: &str,
        period: CalendarMonth,
        raw: RawCarCalendar,
        extracted_at: NaiveDateTime,
        correction: &StatusCorrection,
    ) -> Self {
        let mut days: Vec<CalendarDayEntry> = raw
            .days
            .into_iter()
            .map(|d| {
                let day = parse_day_date(&d.date).map(|date| date.day()).unwrap_or(0);
                let mut entry = CalendarDayEntry::new(d.date, day, d.status, d.value);
                if !d.titulos.trim().is_empty() {
                    entry = entry.with_titulos(d.titulos.trim());
                }
                entry.original_period = Some(period.label());
                entry.normalize();
                entry
            })
            .collect();

        let corrected_statuses = correction.apply(&mut days, extracted_at.date());

        Self {
            cs_code: cs_code.to_string(),
            month: month_name_pt(period.month).unwrap_or_default().to_string(),
            month_number: period.month,
            year: period.year,
            extraction_date: extracted_at,
            total_recebimentos_num: parse_brl_opt(raw.total_recebimentos.as_deref()),
            total_agendamentos_num: parse_brl_opt(raw.total_agendamentos.as_deref()),
            total_recebimentos: raw.total_recebimentos,
            total_agendamentos: raw.total_agendamentos,
            days,
            corrected_statuses,
        }
    }

    /// `CS=13406 | Março/2026`
    pub fn label(&self) -> String {
        format!("CS={} | {}/{}", self.cs_code, self.month, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn extracted_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    }

    fn raw() -> RawCarCalendar {
        serde_json::from_str(
            r#"{
                "total_recebimentos": "R$ 12.345,67",
                "total_agendamentos": "R$ 1.000,00",
                "days": [
                    {"date": "05-03-2026", "value": "R$ 500,00", "status": "SCHEDULED", "titulos": "3 títulos"},
                    {"date": "10-03-2026", "value": "R$ 250,00", "status": "SCHEDULED", "titulos": "1 título"},
                    {"date": "02-03-2026", "value": "R$ 1.200,00", "status": "TRANSFERRED", "titulos": ""}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_raw_normalizes_and_corrects() {
        let period = CalendarMonth::new(2026, 3).unwrap();
        let extraction = CarExtraction::from_raw(
            "13406",
            period,
            raw(),
            extracted_at(),
            &StatusCorrection::default(),
        );

        assert_eq!(extraction.month, "Março");
        assert_eq!(extraction.month_number, 3);
        assert_eq!(extraction.total_recebimentos_num, 12345.67);
        assert_eq!(extraction.total_agendamentos_num, 1000.0);
        assert_eq!(extraction.corrected_statuses, 1);

        let first = &extraction.days[0];
        assert_eq!(first.day, 5);
        assert_eq!(first.status, "TRANSFERRED");
        assert!(first.status_corrected);
        assert_eq!(first.titulos_num, Some(3));
        assert_eq!(first.value_num, 500.0);

        // 当日は補正しない
        assert_eq!(extraction.days[1].status, "SCHEDULED");
        assert_eq!(extraction.days[2].titulos, None);
        assert_eq!(extraction.label(), "CS=13406 | Março/2026");
    }

    #[test]
    fn test_missing_totals_are_zero() {
        let period = CalendarMonth::new(2026, 4).unwrap();
        let extraction = CarExtraction::from_raw(
            "23107",
            period,
            RawCarCalendar::default(),
            extracted_at(),
            &StatusCorrection::default(),
        );

        assert_eq!(extraction.total_recebimentos_num, 0.0);
        assert!(extraction.total_recebimentos.is_none());
        assert!(extraction.days.is_empty());
    }

    #[test]
    fn test_parse_cs_codes() {
        assert_eq!(parse_cs_codes(" 13406, ,14056 "), vec!["13406", "14056"]);
        assert!(parse_cs_codes("").is_empty());
    }
}
