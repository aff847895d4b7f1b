//! ステータス補正
//!
//! 上流システムは過去日付の「予定」ステータスを確定状態に遷移させないことがある。
//! 今日より前の日付で予定のままになっている日を確定ステータスに書き換える。

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calendar::CalendarDayEntry;

pub const DEFAULT_IN_PROGRESS_STATUS: &str = "SCHEDULED";
pub const DEFAULT_TERMINAL_STATUS: &str = "TRANSFERRED";

/// 受け付ける日付形式
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// 日付文字列を解析（ISO、カレンダーのtest id、画面表示の形式）
pub fn parse_day_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCorrection {
    /// 補正対象のステータス
    pub in_progress: String,
    /// 書き換え後のステータス
    pub terminal: String,
}

impl Default for StatusCorrection {
    fn default() -> Self {
        Self {
            in_progress: DEFAULT_IN_PROGRESS_STATUS.to_string(),
            terminal: DEFAULT_TERMINAL_STATUS.to_string(),
        }
    }
}

impl StatusCorrection {
    pub fn new(in_progress: impl Into<String>, terminal: impl Into<String>) -> Self {
        Self {
            in_progress: in_progress.into(),
            terminal: terminal.into(),
        }
    }

    /// `STATUS_IN_PROGRESS` / `STATUS_TERMINAL` で上書き可能
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            in_progress: std::env::var("STATUS_IN_PROGRESS").unwrap_or(defaults.in_progress),
            terminal: std::env::var("STATUS_TERMINAL").unwrap_or(defaults.terminal),
        }
    }

    /// 補正した件数を返す
    pub fn apply(&self, days: &mut [CalendarDayEntry], today: NaiveDate) -> usize {
        let mut corrected = 0;

        for day in days.iter_mut().filter(|d| d.status == self.in_progress) {
            let Some(date) = parse_day_date(&day.date) else {
                warn!("Could not parse date '{}', status left as is", day.date);
                continue;
            };

            if date < today {
                debug!(
                    "Correcting status for {}: {} -> {}",
                    day.date, day.status, self.terminal
                );
                day.status = self.terminal.clone();
                day.status_corrected = true;
                corrected += 1;
            }
        }

        if corrected > 0 {
            info!(
                "Corrected {} stale '{}' statuses (reference date {})",
                corrected, self.in_progress, today
            );
        }
        corrected
    }
}
