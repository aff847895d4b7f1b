//! IAF 更新チェック関連の型定義

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{Credentials, ScraperConfig};
use crate::correction::parse_day_date;
use crate::error::ScraperError;

#[derive(Debug, Clone)]
pub struct IafConfig {
    pub credentials: Credentials,
    pub scraper: ScraperConfig,
}

impl IafConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            scraper: ScraperConfig::default(),
        }
    }

    /// `EXTRANET_USER` / `EXTRANET_PASS`
    pub fn from_env() -> Result<Self, ScraperError> {
        Ok(Self::new(Credentials::from_env(
            "EXTRANET_USER",
            "EXTRANET_PASS",
        )?))
    }

    pub fn with_scraper(mut self, scraper: ScraperConfig) -> Self {
        self.scraper = scraper;
        self
    }
}

/// `23/02/2026, às 09:56:06` → 2026-02-23（時刻部分は見ない）
pub fn parse_update_date(text: &str) -> Option<NaiveDate> {
    let date = text.split(',').next()?;
    parse_day_date(date)
}

/// 更新日判定の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheck {
    /// 画面の表示そのまま（取得できなければ空）
    pub raw: String,
    pub updated_on: Option<NaiveDate>,
    pub checked_on: NaiveDate,
    pub updated_today: bool,
}

impl UpdateCheck {
    pub fn evaluate(raw: impl Into<String>, today: NaiveDate) -> Self {
        let raw = raw.into();
        let updated_on = parse_update_date(&raw);
        Self {
            updated_today: updated_on == Some(today),
            raw,
            updated_on,
            checked_on: today,
        }
    }

    /// 0 = 本日更新済み、1 = 未更新（オーケストレーターは待機する）
    pub fn exit_code(&self) -> i32 {
        if self.updated_today {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_update_date() {
        assert_eq!(
            parse_update_date("23/02/2026, às 09:56:06"),
            Some(date(2026, 2, 23))
        );
        assert_eq!(parse_update_date(" 01/03/2026 "), Some(date(2026, 3, 1)));
        assert_eq!(parse_update_date(""), None);
        assert_eq!(parse_update_date("Carregando..."), None);
    }

    #[test]
    fn test_updated_today() {
        let check = UpdateCheck::evaluate("23/02/2026, às 09:56:06", date(2026, 2, 23));
        assert!(check.updated_today);
        assert_eq!(check.exit_code(), 0);
    }

    #[test]
    fn test_not_updated_today() {
        let check = UpdateCheck::evaluate("22/02/2026, às 23:59:59", date(2026, 2, 23));
        assert!(!check.updated_today);
        assert_eq!(check.updated_on, Some(date(2026, 2, 22)));
        assert_eq!(check.exit_code(), 1);

        let check = UpdateCheck::evaluate("", date(2026, 2, 23));
        assert!(!check.updated_today);
        assert_eq!(check.updated_on, None);
        assert_eq!(check.exit_code(), 1);
    }
}
