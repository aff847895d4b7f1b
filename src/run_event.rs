//! 1回の実行を1つのJSONイベントにまとめる（wide event）
//!
//! 各ステップは tracing にも流し、終了時に `WIDE_EVENT_JSON:{...}` を標準出力に出す。

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const WIDE_EVENT_PREFIX: &str = "WIDE_EVENT_JSON:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStep {
    pub t_ms: f64,
    pub level: StepLevel,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Unknown,
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub correlation_id: Option<String>,
    pub steps: Vec<RunStep>,
    pub context: Map<String, Value>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(skip)]
    started: Instant,
}

impl RunEvent {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service: service.into(),
            correlation_id: None,
            steps: Vec::new(),
            context: Map::new(),
            outcome: Outcome::Unknown,
            duration_ms: None,
            error: None,
            started: Instant::now(),
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    fn elapsed_ms(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
    }

    fn push(&mut self, level: StepLevel, message: String, fields: Map<String, Value>) {
        let t_ms = self.elapsed_ms();
        self.steps.push(RunStep {
            t_ms,
            level,
            message,
            fields,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(service = %self.service, "{}", message);
        self.push(StepLevel::Info, message, Map::new());
    }

    /// 追加フィールド付きのステップ
    pub fn info_with(&mut self, message: impl Into<String>, fields: Map<String, Value>) {
        let message = message.into();
        info!(service = %self.service, "{}", message);
        self.push(StepLevel::Info, message, fields);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(service = %self.service, "{}", message);
        self.push(StepLevel::Warning, message, Map::new());
    }

    pub fn error(&mut self, message: impl Into<String>, err: Option<&dyn std::error::Error>) {
        let message = message.into();
        error!(service = %self.service, "{}", message);
        self.push(StepLevel::Error, message, Map::new());
        if let Some(err) = err {
            self.error = Some(RunError {
                kind: error_kind(err),
                message: err.to_string(),
            });
        }
    }

    pub fn add_context(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.context.insert(key.into(), value);
    }

    /// 結果を確定して1行のJSONを返す
    pub fn finish(&mut self, success: bool) -> String {
        self.duration_ms = Some(self.elapsed_ms());
        self.outcome = if success {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"service":"{}","serialize_error":"{}"}}"#, self.service, e)
        });
        format!("{}{}", WIDE_EVENT_PREFIX, json)
    }

    /// `finish` して標準出力に出す
    pub fn emit(&mut self, success: bool) {
        println!("{}", self.finish(success));
    }
}

/// `ScraperError::Timeout(..)` → `Timeout`
fn error_kind(err: &dyn std::error::Error) -> String {
    let debug = format!("{:?}", err);
    debug
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;

    #[test]
    fn test_steps_and_context_recorded() {
        let mut event = RunEvent::new("ScrapeCarService").with_correlation_id("exec-1");
        event.info("Starting CAR extraction...");
        event.warning("Retrying search");
        event.add_context("periods", vec!["Março/2026", "Abril/2026"]);

        let mut fields = Map::new();
        fields.insert("cs_code".into(), Value::from("13406"));
        event.info_with("Extracted", fields);

        assert_eq!(event.steps.len(), 3);
        assert_eq!(event.steps[1].level, StepLevel::Warning);
        assert_eq!(event.context["periods"][1], "Abril/2026");
        assert_eq!(event.outcome, Outcome::Unknown);
    }

    #[test]
    fn test_finish_emits_prefixed_json() {
        let mut event = RunEvent::new("ScrapeMoozService");
        let err = ScraperError::Timeout("calendar".into());
        event.error("Error in Mooz extraction", Some(&err));

        let line = event.finish(false);

        let json = line.strip_prefix(WIDE_EVENT_PREFIX).unwrap();
        let value: Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["service"], "ScrapeMoozService");
        assert_eq!(value["outcome"], "failure");
        assert_eq!(value["error"]["type"], "Timeout");
        assert_eq!(value["steps"][0]["level"], "ERROR");
        assert!(value["duration_ms"].is_number());
    }

    #[test]
    fn test_step_fields_are_flattened() {
        let mut event = RunEvent::new("svc");
        let mut fields = Map::new();
        fields.insert("rows".into(), Value::from(12));
        event.info_with("Page 1", fields);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["steps"][0]["rows"], 12);
        assert_eq!(value["steps"][0]["message"], "Page 1");
    }
}
