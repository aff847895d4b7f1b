//! ログ初期化
//!
//! 標準出力はオーケストレーター向けの出力行専用なので、ログは stderr に出す。
//! ログディレクトリを指定した場合はファイルにも書く。

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ScraperError;

/// `<script>_YYYY-MM-DD_HH-MM-SS.log`
pub fn log_file_name(script_name: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.log", script_name, now.format("%Y-%m-%d_%H-%M-%S"))
}

/// サブスクライバーを登録。ログファイルを作った場合はそのパスを返す
pub fn init(script_name: &str, log_dir: Option<&Path>) -> Result<Option<PathBuf>, ScraperError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(log_file_name(script_name, Local::now().naive_local()));
            let file = File::create(&path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| ScraperError::Config(format!("ログ初期化に失敗しました: {}", e)))?;

    if let Some(path) = &log_path {
        tracing::info!("Logging to {}", path.display());
    }
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_log_file_name() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap();
        assert_eq!(
            log_file_name("scrape_car", now),
            "scrape_car_2026-03-05_14-07-09.log"
        );
    }
}
