//! 抽出結果の出力
//!
//! - JSONファイル（`<dir>/<prefix>/<prefix>_YYYYMMDD_HHMM.json`）
//! - ワークフローオーケストレーター向けの標準出力行 `::{"outputs": {...}}::`

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::error::ScraperError;

/// オーケストレーターが拾う区切り
pub const OUTPUT_DELIMITER: &str = "::";

/// 日付パーティション付きの出力パス
pub fn timestamped_path(base_dir: &Path, prefix: &str, now: NaiveDateTime) -> PathBuf {
    base_dir
        .join(prefix)
        .join(format!("{}_{}.json", prefix, now.format("%Y%m%d_%H%M")))
}

/// 整形済みJSONとして保存（親ディレクトリは作成する）
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ScraperError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, &json)?;
    info!("Saved {} bytes to {}", json.len(), path.display());
    Ok(())
}

/// `::{"outputs":{"<key>":<value>}}::`
///
/// `Value` を経由しないので、値側のキー順はそのまま残る。
pub fn workflow_output_line<T: Serialize + ?Sized>(
    key: &str,
    value: &T,
) -> Result<String, ScraperError> {
    let key = serde_json::to_string(key)?;
    let value = serde_json::to_string(value)?;
    Ok(format!(
        "{}{{\"outputs\":{{{}:{}}}}}{}",
        OUTPUT_DELIMITER, key, value, OUTPUT_DELIMITER
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScrapedRecord;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_timestamped_path() {
        let now = NaiveDate::from_ymd_opt(2026, 2, 3)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        let path = timestamped_path(Path::new("extracoes"), "car", now);
        assert_eq!(path, PathBuf::from("extracoes/car/car_20260203_0905.json"));
    }

    #[test]
    fn test_workflow_output_line() {
        let line = workflow_output_line("resultado", &json!({"status": "changed"})).unwrap();

        assert!(line.starts_with("::{"));
        assert!(line.ends_with("}::"));
        let inner = &line[2..line.len() - 2];
        let parsed: serde_json::Value = serde_json::from_str(inner).unwrap();
        assert_eq!(parsed["outputs"]["resultado"]["status"], "changed");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_workflow_output_keeps_record_order() {
        let record: ScrapedRecord = vec![("Situação", "OK"), ("CNPJ", "1")].into_iter().collect();
        let line = workflow_output_line("resultado", &record).unwrap();
        assert_eq!(
            line,
            r#"::{"outputs":{"resultado":{"Situação":"OK","CNPJ":"1"}}}::"#
        );
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mooz").join("mooz_20260101_0000.json");

        write_json(&path, &vec![json!({"valor": "R$ 1,00"})]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed[0]["valor"], "R$ 1,00");
    }
}
