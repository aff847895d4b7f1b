//! VIDIBR 監査フォーム関連の型定義

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Credentials, ScraperConfig};
use crate::cursor::ChangeReport;
use crate::error::ScraperError;
use crate::normalize::strip_label;
use crate::record::ScrapedRecord;

/// 詳細ページで `<strong>ラベル:</strong>` の形で表示される項目
pub const DETAIL_FIELDS: [&str; 7] = [
    "CNPJ",
    "Endereço",
    "Período",
    "Número do QT",
    "Número da Loja",
    "Data da Visita",
    "Situação",
];

pub const LOCAL_FIELD: &str = "Local visitado";
pub const STORE_FIELD: &str = "Loja";

/// VIDIBR スクレイパー設定
#[derive(Debug, Clone)]
pub struct AuditoriaConfig {
    pub credentials: Credentials,
    pub scraper: ScraperConfig,
    /// 前回の最新フォーム名
    pub cursor_path: PathBuf,
    /// 判定結果のJSON
    pub result_path: PathBuf,
}

impl AuditoriaConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            scraper: ScraperConfig::default(),
            cursor_path: PathBuf::from("ultimo_formulario.txt"),
            result_path: PathBuf::from("novo_formulario.json"),
        }
    }

    /// `VIDIBR_USER` / `VIDIBR_PASS`、任意で `DADOS_ARQUIVO`（結果JSONのパス）
    pub fn from_env() -> Result<Self, ScraperError> {
        let mut config = Self::new(Credentials::from_env("VIDIBR_USER", "VIDIBR_PASS")?);
        if let Ok(path) = std::env::var("DADOS_ARQUIVO") {
            if !path.trim().is_empty() {
                config.result_path = PathBuf::from(path.trim());
            }
        }
        Ok(config)
    }

    pub fn with_scraper(mut self, scraper: ScraperConfig) -> Self {
        self.scraper = scraper;
        self
    }

    pub fn with_cursor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cursor_path = path.into();
        self
    }

    pub fn with_result_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_path = path.into();
        self
    }
}

/// ダイアログのラベルからフォーム名を取り出す（「todos」は除外、表示順を維持）
pub fn form_names(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("todos"))
        .map(str::to_string)
        .collect()
}

/// 詳細ページから取り出したままの値
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDetail {
    pub local: Option<String>,
    /// ラベル → `ラベル: 値` のテキスト
    #[serde(default)]
    pub fields: HashMap<String, String>,
    pub loja: Option<String>,
}

impl RawDetail {
    /// 固定の項目順で `ScrapedRecord` にする。取れなかった項目は `N/E`
    pub fn into_record(self) -> ScrapedRecord {
        let mut record = ScrapedRecord::new();
        record.insert_or_missing(LOCAL_FIELD, self.local);
        for field in DETAIL_FIELDS {
            let value = self
                .fields
                .get(field)
                .map(|text| strip_label(text, field));
            record.insert_or_missing(field, value);
        }
        record.insert_or_missing(STORE_FIELD, self.loja);
        record
    }
}

/// 新着判定の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub total_forms: usize,
    #[serde(flatten)]
    pub report: ChangeReport<ScrapedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ChangeStatus;
    use crate::record::NOT_AVAILABLE;

    #[test]
    fn test_form_names_excludes_todos() {
        let labels = vec![
            " Todos ".to_string(),
            "Auditoria Março 2026".to_string(),
            "".to_string(),
            "Auditoria Fevereiro 2026".to_string(),
        ];
        assert_eq!(
            form_names(&labels),
            vec!["Auditoria Março 2026", "Auditoria Fevereiro 2026"]
        );
    }

    #[test]
    fn test_into_record_fixed_order_and_missing() {
        let mut fields = HashMap::new();
        fields.insert("CNPJ".to_string(), "CNPJ: 12.345.678/0001-90".to_string());
        fields.insert("Situação".to_string(), "Situação: Concluída".to_string());
        let raw = RawDetail {
            local: Some(" Loja Centro ".into()),
            fields,
            loja: None,
        };

        let record = raw.into_record();

        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.first(), Some(&LOCAL_FIELD));
        assert_eq!(keys.last(), Some(&STORE_FIELD));
        assert_eq!(record.len(), DETAIL_FIELDS.len() + 2);
        assert_eq!(record.get(LOCAL_FIELD), Some("Loja Centro"));
        assert_eq!(record.get("CNPJ"), Some("12.345.678/0001-90"));
        assert_eq!(record.get("Situação"), Some("Concluída"));
        assert_eq!(record.get("Endereço"), Some(NOT_AVAILABLE));
        assert!(record.is_missing(STORE_FIELD));
    }

    #[test]
    fn test_audit_result_serializes_flat() {
        let result = AuditResult {
            total_forms: 2,
            report: ChangeReport {
                status: ChangeStatus::Unchanged,
                current: "Form A".into(),
                previous: Some("Form A".into()),
                detail: None,
                persisted: false,
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total_forms"], 2);
        assert_eq!(json["status"], "unchanged");
        assert_eq!(json["current"], "Form A");

        let back: AuditResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
