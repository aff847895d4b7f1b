//! VIDIBR スクレイパー実装
//!
//! 実施済み監査フォームの一覧を取得し、最新フォームが前回と異なれば詳細を取得する

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{js_string, BrowserSession};
use crate::cursor::{detect_change, CursorStore};
use crate::error::ScraperError;
use crate::record::ScrapedRecord;
use crate::traits::Scraper;

use super::types::{form_names, AuditResult, AuditoriaConfig, RawDetail, DETAIL_FIELDS};

const LOGIN_URL: &str = "https://cliente.vidibr.com/";

const INPUT_USER: &str = "input[data-cy='login']";
const INPUT_PASSWORD: &str = "input[data-cy='senha']";
const BUTTON_LOGIN: &str = "button[data-cy='entrar']";
const BUTTON_EVALUATIONS: &str = "button[data-cy='avaliacoes-realizadas']";
const DIALOG: &str = ".alert-wrapper";
const DETAIL_BOX: &str = ".box-pergunta";
const DETAIL_BOX_FALLBACK: &str = ".box-pergunta, .questionario-container, ion-card";

const FORM_LABELS_SCRIPT: &str = r#"
    Array.from(document.querySelectorAll('.alert-radio-label')).map(l => l.textContent || '')
"#;

fn select_form_script(name: &str) -> String {
    format!(
        r#"
        (() => {{
            const wanted = {};
            const radio = Array.from(document.querySelectorAll('button.alert-radio')).find(b => {{
                const label = b.querySelector('.alert-radio-label');
                return label && label.textContent.trim().includes(wanted);
            }});
            if (!radio) return false;
            radio.click();
            return true;
        }})()
    "#,
        js_string(name)
    )
}

fn extract_detail_script() -> String {
    let labels = serde_json::to_string(&DETAIL_FIELDS).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"
        (() => {{
            const labels = {};
            const box = document.querySelector('.box-pergunta');
            const local = document.querySelector('[data-cy="abrirQuestionarioJob"]');
            const fields = {{}};
            if (box) {{
                box.querySelectorAll('span').forEach(span => {{
                    const strong = span.querySelector('strong');
                    if (!strong) return;
                    const label = strong.textContent.trim().replace(/:$/, '');
                    if (labels.includes(label) && !(label in fields)) {{
                        fields[label] = span.textContent.trim();
                    }}
                }});
            }}
            const loja = box ? box.querySelector('readmore-component > div') : null;
            return {{
                local: local ? local.textContent.trim() : null,
                fields,
                loja: loja ? loja.textContent.trim() : null
            }};
        }})()
    "#,
        labels
    )
}

/// VIDIBR 監査フォームスクレイパー
pub struct AuditoriaScraper {
    config: AuditoriaConfig,
    session: Option<BrowserSession>,
}

impl AuditoriaScraper {
    pub fn new(config: AuditoriaConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &AuditoriaConfig {
        &self.config
    }

    fn session(&self) -> Result<&BrowserSession, ScraperError> {
        self.session
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Browser not initialized".to_string()))
    }

    async fn open_jobs_dialog(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Opening completed evaluations...");
        session
            .wait_for_selector(BUTTON_EVALUATIONS, Duration::from_secs(15))
            .await?;
        session.click(BUTTON_EVALUATIONS).await?;
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    /// 一覧ダイアログのフォーム名（新しい順）
    async fn list_forms(&self) -> Result<Vec<String>, ScraperError> {
        let session = self.session()?;
        session
            .wait_for_selector(DIALOG, Duration::from_secs(15))
            .await?;

        let labels: Vec<String> = session.evaluate(FORM_LABELS_SCRIPT).await?;
        let forms = form_names(&labels);
        info!("Found {} forms", forms.len());
        Ok(forms)
    }

    async fn select_form(&self, name: &str) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Selecting form: {}", name);

        if !session.evaluate::<bool>(&select_form_script(name)).await? {
            return Err(ScraperError::ElementNotFound(format!("form '{}'", name)));
        }
        sleep(Duration::from_millis(500)).await;

        session.click_text("button.alert-button", "OK").await?;
        if let Err(e) = session.wait_for_gone(DIALOG, Duration::from_secs(10)).await {
            warn!("Dialog may not have closed: {}", e);
        }
        session.wait_request_idle().await?;
        sleep(Duration::from_secs(3)).await;
        Ok(())
    }

    async fn wait_detail_box(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        let first_err = match session
            .wait_for_selector(DETAIL_BOX, Duration::from_secs(45))
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        warn!(
            "Detail box not found, retrying... URL: {}",
            session.current_url().await
        );
        if let Ok(body) = session
            .evaluate::<String>("(document.body ? document.body.innerText : '').slice(0, 500)")
            .await
        {
            debug!("Visible content: {}", body);
        }

        session.wait_request_idle().await?;
        sleep(Duration::from_secs(3)).await;
        if session
            .wait_for_selector(DETAIL_BOX, Duration::from_secs(30))
            .await
            .is_ok()
        {
            return Ok(());
        }

        error!(
            "Detail box not found after retry. URL: {}",
            session.current_url().await
        );
        match session
            .wait_for_selector(DETAIL_BOX_FALLBACK, Duration::from_secs(10))
            .await
        {
            Ok(()) => {
                info!("Found detail via fallback selector");
                Ok(())
            }
            Err(_) => Err(first_err),
        }
    }

    async fn extract_detail(&self) -> Result<ScrapedRecord, ScraperError> {
        let session = self.session()?;
        info!("Extracting form detail from {}", session.current_url().await);

        // 店名の全文を表示
        if session.click_text("a", "Ver mais").await.is_ok() {
            debug!("Expanded 'Ver mais'");
            sleep(Duration::from_secs(1)).await;
        }

        self.wait_detail_box().await?;

        let raw: RawDetail = session.evaluate(&extract_detail_script()).await?;
        let record = raw.into_record();
        info!("Extracted {} detail fields", record.len());
        Ok(record)
    }

    /// フォームを開いて詳細を取得
    pub async fn form_detail(&self, name: &str) -> Result<ScrapedRecord, ScraperError> {
        let result = async {
            self.select_form(name).await?;
            self.extract_detail().await
        }
        .await;

        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "auditoria_detail").await;
        }
        result
    }

    async fn check(
        &mut self,
        store: &(impl CursorStore + ?Sized),
    ) -> Result<Option<AuditResult>, ScraperError> {
        self.login().await?;
        let forms = self.extract().await?;

        let Some(newest) = forms.first() else {
            warn!("No forms listed");
            return Ok(None);
        };

        let report = detect_change(store, newest, || self.form_detail(newest)).await?;
        Ok(Some(AuditResult {
            total_forms: forms.len(),
            report,
        }))
    }

    /// ログインから新着判定までを実行し、ブラウザを閉じる。
    /// フォームが1件も無ければ `None`
    pub async fn run_with_cursor(
        &mut self,
        store: &(impl CursorStore + ?Sized),
    ) -> Result<Option<AuditResult>, ScraperError> {
        self.initialize().await?;
        let result = self.check(store).await;
        if let Err(e) = self.close().await {
            warn!("Failed to close scraper: {}", e);
        }
        result
    }
}

#[async_trait]
impl Scraper for AuditoriaScraper {
    /// フォーム名一覧（新しい順）
    type Output = Vec<String>;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.session = Some(BrowserSession::launch(&self.config.scraper).await?);
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        let session = self.session()?;
        session.goto(LOGIN_URL).await?;
        session.wait_request_idle().await?;

        if session.exists(BUTTON_EVALUATIONS).await {
            info!("Active session detected");
            return Ok(());
        }

        let user = &self.config.credentials.user;
        info!(
            "Filling credentials for user {}***",
            user.chars().take(3).collect::<String>()
        );
        session
            .wait_for_selector(INPUT_USER, Duration::from_secs(15))
            .await?;
        session.fill(INPUT_USER, user).await?;
        session
            .fill(INPUT_PASSWORD, &self.config.credentials.password)
            .await?;
        session.click(BUTTON_LOGIN).await?;

        info!("Waiting for login confirmation...");
        match session
            .wait_for_selector(BUTTON_EVALUATIONS, Duration::from_secs(30))
            .await
        {
            Ok(()) => {
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                let url = session.current_url().await;
                error!("Failed to confirm login. URL: {}", url);
                Err(ScraperError::Login(format!("{} ({})", e, url)))
            }
        }
    }

    async fn extract(&mut self) -> Result<Vec<String>, ScraperError> {
        let result = async {
            self.open_jobs_dialog().await?;
            self.list_forms().await
        }
        .await;

        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "auditoria").await;
        }
        result
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}
