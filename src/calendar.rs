//! カレンダーグリッドの当月抽出
//!
//! ポータルのカレンダーは常に固定週数で描画され、前月末・翌月初の
//! はみ出し日を含む。日付番号が減少した位置（31 → 1 など）を月の境界と
//! みなし、`Previous → Current → Next` の順に遷移させて当月分だけを残す。

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ScraperError;
use crate::normalize::{parse_brl, parse_titulos_opt};

const MONTH_NAMES_PT: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// 月番号（1-12）→ ポルトガル語の月名
pub fn month_name_pt(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES_PT.get(i as usize))
        .copied()
}

/// 表示中の年月
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ScraperError> {
        if !(1..=12).contains(&month) {
            return Err(ScraperError::MalformedCalendar(format!(
                "月番号が不正です: {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// `fevereiro 2026` 形式のヘッダーを解析
    pub fn parse_header(text: &str) -> Result<Self, ScraperError> {
        let lower = text.trim().to_lowercase();
        let mut parts = lower.split_whitespace();

        let (Some(name), Some(year)) = (parts.next(), parts.next()) else {
            return Err(ScraperError::MalformedCalendar(format!(
                "ヘッダー形式が不正です: {}",
                text
            )));
        };

        let month = MONTH_NAMES_PT
            .iter()
            .position(|m| m.to_lowercase() == name)
            .map(|i| i as u32 + 1)
            .ok_or_else(|| ScraperError::MalformedCalendar(format!("不明な月名: {}", name)))?;

        let year = year
            .parse::<i32>()
            .map_err(|_| ScraperError::MalformedCalendar(format!("不明な年: {}", year)))?;

        Ok(Self { year, month })
    }

    /// `Fevereiro/2026`
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            month_name_pt(self.month).unwrap_or("?"),
            self.year
        )
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

/// 抽出対象期間（当月と翌月）
pub fn extraction_periods(today: NaiveDate) -> Vec<CalendarMonth> {
    let current = CalendarMonth::of(today);
    vec![current, current.next()]
}

/// 当月1日 〜 翌月末日（`DD/MM/YYYY`）
pub fn date_range(today: NaiveDate) -> (String, String) {
    let current = CalendarMonth::of(today);
    let start = current.first_day().unwrap_or(today);
    let end = current.next().last_day().unwrap_or(today);
    (
        start.format("%d/%m/%Y").to_string(),
        end.format("%d/%m/%Y").to_string(),
    )
}

/// グリッド上の位置がどの月に属するか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthStage {
    Previous,
    Current,
    Next,
}

impl MonthStage {
    /// 先頭セルが1日でなければ前月のはみ出しから始まる
    pub fn initial(first_day: u32) -> Self {
        if first_day > 1 {
            MonthStage::Previous
        } else {
            MonthStage::Current
        }
    }

    /// `(新しいステージ, 残すか)` を返す。
    /// `Next` でさらに日付が減少した場合は `None`（3回目の境界は想定外）
    pub fn transition(self, prev_day: u32, day: u32) -> Option<(MonthStage, bool)> {
        let stage = if day < prev_day {
            match self {
                MonthStage::Previous => MonthStage::Current,
                MonthStage::Current => MonthStage::Next,
                MonthStage::Next => return None,
            }
        } else {
            self
        };
        Some((stage, stage == MonthStage::Current))
    }
}

/// カレンダーの生セル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarCell {
    pub day: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub titulos: Option<String>,
    pub has_data: bool,
}

/// 当月の1日分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDayEntry {
    pub date: String,
    pub day: u32,
    pub status: String,
    pub value: String,
    #[serde(default)]
    pub titulos: Option<String>,
    #[serde(default)]
    pub value_num: f64,
    #[serde(default)]
    pub titulos_num: Option<u64>,
    #[serde(default)]
    pub status_corrected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_period: Option<String>,
}

impl CalendarDayEntry {
    pub fn new(
        date: impl Into<String>,
        day: u32,
        status: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            day,
            status: status.into(),
            value: value.into(),
            titulos: None,
            value_num: 0.0,
            titulos_num: None,
            status_corrected: false,
            original_period: None,
        }
    }

    pub fn with_titulos(mut self, titulos: impl Into<String>) -> Self {
        self.titulos = Some(titulos.into());
        self
    }

    /// 数値フィールドを埋める
    pub fn normalize(&mut self) {
        self.value_num = parse_brl(&self.value);
        self.titulos_num = parse_titulos_opt(self.titulos.as_deref());
    }
}

/// 表示中の月に属し、かつデータを持つセルだけを返す
pub fn dedupe_current_month(
    cells: &[CalendarCell],
    month: CalendarMonth,
) -> Result<Vec<CalendarDayEntry>, ScraperError> {
    let Some(first) = cells.first() else {
        return Ok(Vec::new());
    };

    let period = month.label();
    let mut stage = MonthStage::initial(first.day);
    let mut prev_day = first.day;
    let mut days = Vec::new();

    info!(
        "Starting date sequence: first_day={}, initial_stage={:?}",
        first.day, stage
    );

    for (index, cell) in cells.iter().enumerate() {
        let (next_stage, keep) = stage.transition(prev_day, cell.day).ok_or_else(|| {
            ScraperError::MalformedCalendar(format!(
                "3回目の月境界を検出しました: index={}, {} -> {}",
                index, prev_day, cell.day
            ))
        })?;

        if next_stage != stage {
            debug!(
                "Month boundary at index {}: {} -> {} ({:?} -> {:?})",
                index, prev_day, cell.day, stage, next_stage
            );
        }
        stage = next_stage;
        prev_day = cell.day;

        if !keep || !cell.has_data {
            continue;
        }

        let date = month.date(cell.day).ok_or_else(|| {
            ScraperError::MalformedCalendar(format!(
                "{} に {} 日は存在しません",
                period, cell.day
            ))
        })?;

        let mut entry = CalendarDayEntry::new(
            date.format("%Y-%m-%d").to_string(),
            cell.day,
            cell.status.clone().unwrap_or_default(),
            cell.value.clone().unwrap_or_default(),
        );
        entry.titulos = cell.titulos.clone();
        entry.original_period = Some(period.clone());
        entry.normalize();
        days.push(entry);
    }

    info!("Kept {} days belonging to {}", days.len(), period);
    Ok(days)
}
