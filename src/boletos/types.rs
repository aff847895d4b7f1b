//! Portal Boletos 関連の型定義

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{Credentials, ScraperConfig};
use crate::error::ScraperError;
use crate::normalize::clean_cell;
use crate::record::ScrapedRecord;

/// 読み取るページ数の上限
pub const MAX_GRID_PAGES: u32 = 50;

/// ASP.NET ページャーの「続きあり」リンク
const PAGER_ELLIPSIS: &str = "...";

/// Portal Boletos スクレイパー設定
#[derive(Debug, Clone)]
pub struct BoletosConfig {
    pub credentials: Credentials,
    pub scraper: ScraperConfig,
    pub max_pages: u32,
}

impl BoletosConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            scraper: ScraperConfig::default(),
            max_pages: MAX_GRID_PAGES,
        }
    }

    /// `LOGIN_EXTRANET` / `PASS_EXTRANET`（CARと共通）
    pub fn from_env() -> Result<Self, ScraperError> {
        Ok(Self::new(Credentials::from_env(
            "LOGIN_EXTRANET",
            "PASS_EXTRANET",
        )?))
    }

    pub fn with_scraper(mut self, scraper: ScraperConfig) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

/// `Dt. Vencto` → `dt_vencto`
pub fn clean_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('/', "_")
        .replace('.', "")
}

/// ページャーの1セル。現在ページはリンクではなく `<span>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PagerCell {
    pub text: String,
    #[serde(default)]
    pub current: bool,
}

/// グリッド1ページ分（先頭の機能アイコン列は除外済み）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGridPage {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    /// ページャー行が無ければ `None`
    #[serde(default)]
    pub pager: Option<Vec<PagerCell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerInfo {
    pub current: u32,
    pub total: u32,
}

impl PagerInfo {
    /// 表示中のページ番号から現在ページと最終ページを求める。
    /// 末尾が `...` ならその先にもう1ページある
    pub fn parse(cells: Option<&[PagerCell]>) -> Self {
        let single = Self {
            current: 1,
            total: 1,
        };
        let Some(cells) = cells else {
            return single;
        };

        let current = cells
            .iter()
            .find(|c| c.current)
            .and_then(|c| c.text.trim().parse::<u32>().ok())
            .unwrap_or(1);
        let Some(max) = cells
            .iter()
            .filter_map(|c| c.text.trim().parse::<u32>().ok())
            .max()
        else {
            return single;
        };

        let more = cells
            .last()
            .is_some_and(|c| c.text.trim() == PAGER_ELLIPSIS);
        Self {
            current,
            total: max.max(current) + u32::from(more),
        }
    }

    pub fn next(&self) -> Option<u32> {
        (self.current < self.total).then_some(self.current + 1)
    }
}

/// 行をヘッダー名のレコードにする。全セルが空の行は捨て、
/// 空セル（NBSPのみを含む）は `NOT_AVAILABLE`
pub fn rows_to_records(headers: &[String], rows: &[Vec<String>]) -> Vec<ScrapedRecord> {
    rows.iter()
        .filter(|row| row.iter().any(|cell| clean_cell(cell).is_some()))
        .map(|row| {
            let mut record = ScrapedRecord::new();
            for (i, header) in headers.iter().enumerate() {
                record.insert_or_missing(header.as_str(), row.get(i).and_then(|c| clean_cell(c)));
            }
            record
        })
        .collect()
}

/// 期限範囲ごとの抽出結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoletosExtraction {
    /// `DD/MM/YYYY`
    pub start_date: String,
    pub end_date: String,
    pub extraction_date: NaiveDateTime,
    pub headers: Vec<String>,
    pub pages: u32,
    pub rows: Vec<ScrapedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NOT_AVAILABLE;

    fn cell(text: &str, current: bool) -> PagerCell {
        PagerCell {
            text: text.to_string(),
            current,
        }
    }

    #[test]
    fn test_clean_header() {
        assert_eq!(clean_header("Dt. Vencto"), "dt_vencto");
        assert_eq!(clean_header(" Nosso Número "), "nosso_número");
        assert_eq!(clean_header("CNPJ/CPF"), "cnpj_cpf");
        assert_eq!(clean_header("Valor"), "valor");
    }

    #[test]
    fn test_rows_to_records() {
        let headers: Vec<String> = ["dt_vencto", "valor", "situação"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = vec![
            vec!["10/03/2026".to_string(), "R$ 1.234,56".to_string(), "\u{a0}".to_string()],
            vec![String::new(), "\u{a0}".to_string(), " ".to_string()],
            vec!["15/03/2026".to_string()],
        ];

        let records = rows_to_records(&headers, &rows);

        assert_eq!(records.len(), 2);
        let first: Vec<_> = records[0].iter().collect();
        assert_eq!(
            first,
            vec![
                ("dt_vencto", "10/03/2026"),
                ("valor", "R$ 1.234,56"),
                ("situação", NOT_AVAILABLE),
            ]
        );
        assert_eq!(records[1].get("dt_vencto"), Some("15/03/2026"));
        assert!(records[1].is_missing("valor"));
    }

    #[test]
    fn test_pager_without_row_is_single_page() {
        let info = PagerInfo::parse(None);
        assert_eq!(info, PagerInfo { current: 1, total: 1 });
        assert_eq!(info.next(), None);
    }

    #[test]
    fn test_pager_numbers() {
        let cells = vec![cell("1", false), cell("2", true), cell("3", false)];
        let info = PagerInfo::parse(Some(cells.as_slice()));
        assert_eq!(info, PagerInfo { current: 2, total: 3 });
        assert_eq!(info.next(), Some(3));

        let cells = vec![cell("1", false), cell("2", false), cell("3", true)];
        assert_eq!(PagerInfo::parse(Some(cells.as_slice())).next(), None);
    }

    #[test]
    fn test_pager_trailing_ellipsis_has_more() {
        let mut cells: Vec<PagerCell> = (1..=10).map(|n| cell(&n.to_string(), n == 10)).collect();
        cells.push(cell("...", false));

        let info = PagerInfo::parse(Some(cells.as_slice()));
        assert_eq!(info, PagerInfo { current: 10, total: 11 });

        // 先頭の ... は前のブロック
        let cells = vec![cell("...", false), cell("11", true), cell("12", false)];
        assert_eq!(
            PagerInfo::parse(Some(cells.as_slice())),
            PagerInfo { current: 11, total: 12 }
        );
    }

    #[test]
    fn test_raw_grid_page_deserializes() {
        let page: RawGridPage = serde_json::from_str(
            r#"{"headers": ["Dt. Vencto"], "rows": [["10/03/2026"]], "pager": null}"#,
        )
        .unwrap();
        assert_eq!(page.headers, vec!["Dt. Vencto"]);
        assert!(page.pager.is_none());
    }
}
