use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::Local;
use serde::Serialize;
use tower::Service;
use tracing::info;

use crate::auditoria::{AuditResult, AuditoriaConfig, AuditoriaScraper};
use crate::boletos::{BoletosConfig, BoletosExtraction, BoletosScraper};
use crate::car::{CarConfig, CarExtraction, CarScraper};
use crate::cursor::FileCursorStore;
use crate::error::ScraperError;
use crate::iaf::{IafConfig, IafScraper, UpdateCheck};
use crate::mooz::{MoozCalendar, MoozConfig, MoozScraper};
use crate::output::{timestamped_path, workflow_output_line, write_json};
use crate::traits::Scraper;

/// オーケストレーターに渡す監査結果のキー
pub const AUDIT_OUTPUT_KEY: &str = "resultado";

/// 実行するフロー
#[derive(Debug, Clone)]
pub enum FlowRequest {
    Mooz(MoozConfig),
    Car(CarConfig),
    Boletos(BoletosConfig),
    Auditoria(AuditoriaConfig),
    Iaf(IafConfig),
}

impl FlowRequest {
    pub fn name(&self) -> &'static str {
        match self {
            FlowRequest::Mooz(_) => "mooz",
            FlowRequest::Car(_) => "car",
            FlowRequest::Boletos(_) => "boletos",
            FlowRequest::Auditoria(_) => "auditoria",
            FlowRequest::Iaf(_) => "iaf",
        }
    }
}

impl From<MoozConfig> for FlowRequest {
    fn from(config: MoozConfig) -> Self {
        FlowRequest::Mooz(config)
    }
}

impl From<CarConfig> for FlowRequest {
    fn from(config: CarConfig) -> Self {
        FlowRequest::Car(config)
    }
}

impl From<BoletosConfig> for FlowRequest {
    fn from(config: BoletosConfig) -> Self {
        FlowRequest::Boletos(config)
    }
}

impl From<IafConfig> for FlowRequest {
    fn from(config: IafConfig) -> Self {
        FlowRequest::Iaf(config)
    }
}

impl From<AuditoriaConfig> for FlowRequest {
    fn from(config: AuditoriaConfig) -> Self {
        FlowRequest::Auditoria(config)
    }
}

/// フロー実行結果
#[derive(Debug)]
pub enum FlowOutput {
    Mooz {
        calendars: Vec<MoozCalendar>,
        path: PathBuf,
    },
    Car {
        extractions: Vec<CarExtraction>,
        path: PathBuf,
    },
    Boletos {
        extraction: BoletosExtraction,
        path: PathBuf,
    },
    /// フォームが1件も無ければ `result` は `None`（ファイルも書かない）
    Auditoria {
        result: Option<AuditResult>,
        path: PathBuf,
    },
    /// 判定のみでファイルは書かない
    Iaf { check: UpdateCheck },
}

impl FlowOutput {
    /// `::{"outputs":...}::` 行（監査フローのみ）
    pub fn workflow_output(&self) -> Result<Option<String>, ScraperError> {
        match self {
            FlowOutput::Auditoria {
                result: Some(result),
                ..
            } => workflow_output_line(AUDIT_OUTPUT_KEY, result).map(Some),
            _ => Ok(None),
        }
    }

    /// 保存したファイル
    pub fn path(&self) -> Option<&Path> {
        match self {
            FlowOutput::Mooz { path, .. }
            | FlowOutput::Car { path, .. }
            | FlowOutput::Boletos { path, .. }
            | FlowOutput::Auditoria { path, .. } => Some(path),
            FlowOutput::Iaf { .. } => None,
        }
    }
}

/// `<output_dir>/<prefix>/<prefix>_YYYYMMDD_HHMM.json` に保存
fn save_partitioned<T: Serialize + ?Sized>(
    output_dir: &Path,
    prefix: &str,
    value: &T,
) -> Result<PathBuf, ScraperError> {
    let path = timestamped_path(output_dir, prefix, Local::now().naive_local());
    write_json(&path, value)?;
    Ok(path)
}

/// tower::Serviceを実装したフローサービス
#[derive(Debug, Clone, Default)]
pub struct FlowService {}

impl FlowService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<FlowRequest> for FlowService {
    type Response = FlowOutput;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: FlowRequest) -> Self::Future {
        info!("フロー実行リクエスト受信: {}", req.name());

        Box::pin(async move {
            let output = match req {
                FlowRequest::Mooz(config) => {
                    let output_dir = config.scraper.output_dir.clone();
                    let calendars = MoozScraper::new(config).execute().await?;
                    let path = save_partitioned(&output_dir, "mooz", &calendars)?;
                    FlowOutput::Mooz { calendars, path }
                }
                FlowRequest::Car(config) => {
                    let output_dir = config.scraper.output_dir.clone();
                    let extractions = CarScraper::new(config).execute().await?;
                    let path = save_partitioned(&output_dir, "car", &extractions)?;
                    FlowOutput::Car { extractions, path }
                }
                FlowRequest::Boletos(config) => {
                    let output_dir = config.scraper.output_dir.clone();
                    let extraction = BoletosScraper::new(config).execute().await?;
                    let path = save_partitioned(&output_dir, "boletos", &extraction)?;
                    FlowOutput::Boletos { extraction, path }
                }
                FlowRequest::Auditoria(config) => {
                    let store = FileCursorStore::new(&config.cursor_path);
                    let path = config.result_path.clone();
                    let result = AuditoriaScraper::new(config)
                        .run_with_cursor(&store)
                        .await?;
                    if let Some(result) = &result {
                        write_json(&path, result)?;
                    }
                    FlowOutput::Auditoria { result, path }
                }
                FlowRequest::Iaf(config) => {
                    let check = IafScraper::new(config).execute().await?;
                    FlowOutput::Iaf { check }
                }
            };

            info!("フロー完了: path={:?}", output.path());
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::cursor::{ChangeReport, ChangeStatus};
    use chrono::NaiveDate;

    fn creds() -> Credentials {
        Credentials::new("user", "pass")
    }

    #[test]
    fn test_flow_request_from_config() {
        let req: FlowRequest = MoozConfig::new(creds()).into();
        assert_eq!(req.name(), "mooz");

        let req: FlowRequest = CarConfig::new(creds()).into();
        assert_eq!(req.name(), "car");

        let req: FlowRequest = BoletosConfig::new(creds()).into();
        assert_eq!(req.name(), "boletos");

        let req: FlowRequest = AuditoriaConfig::new(creds()).into();
        assert_eq!(req.name(), "auditoria");

        let req: FlowRequest = IafConfig::new(creds()).into();
        assert_eq!(req.name(), "iaf");
    }

    #[test]
    fn test_workflow_output_only_for_audit() {
        let output = FlowOutput::Auditoria {
            result: Some(AuditResult {
                total_forms: 1,
                report: ChangeReport {
                    status: ChangeStatus::FirstSeen,
                    current: "Form A".into(),
                    previous: None,
                    detail: None,
                    persisted: true,
                },
            }),
            path: PathBuf::from("novo_formulario.json"),
        };

        let line = output.workflow_output().unwrap().unwrap();
        assert!(line.starts_with(r#"::{"outputs":{"resultado":"#));
        assert!(line.contains(r#""status":"first_seen""#));

        let empty = FlowOutput::Auditoria {
            result: None,
            path: PathBuf::from("x.json"),
        };
        assert!(empty.workflow_output().unwrap().is_none());

        let car = FlowOutput::Car {
            extractions: Vec::new(),
            path: PathBuf::from("car.json"),
        };
        assert!(car.workflow_output().unwrap().is_none());
        assert_eq!(car.path(), Some(Path::new("car.json")));

        let iaf = FlowOutput::Iaf {
            check: UpdateCheck::evaluate("", NaiveDate::from_ymd_opt(2026, 2, 23).unwrap()),
        };
        assert!(iaf.workflow_output().unwrap().is_none());
        assert_eq!(iaf.path(), None);
    }

    #[test]
    fn test_save_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_partitioned(dir.path(), "car", &Vec::<CarExtraction>::new()).unwrap();

        assert!(path.starts_with(dir.path().join("car")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("car_") && name.ends_with(".json"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
