//! IAF 更新チェック実装

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::error::ScraperError;
use crate::extranet;
use crate::traits::Scraper;

use super::types::{IafConfig, UpdateCheck};

const SUMMARY_URL: &str = "https://extranet.grupoboticario.com.br/mfe/gi/iaf-consolidated/summary";

/// 更新日表示の要素。クラス名が変わった場合は日付形式のspanを探す
const UPDATE_TEXT_SCRIPT: &str = r#"
    (() => {
        const el = document.querySelector('span.sc-dlWCHZ')
            || Array.from(document.querySelectorAll('span'))
                .find(s => /^\d{2}\/\d{2}\/\d{4},\s*às/.test((s.textContent || '').trim()));
        return el ? el.textContent.trim() : null;
    })()
"#;

/// IAF ダッシュボード更新チェッカー
pub struct IafScraper {
    config: IafConfig,
    session: Option<BrowserSession>,
}

impl IafScraper {
    pub fn new(config: IafConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    fn session(&self) -> Result<&BrowserSession, ScraperError> {
        self.session
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("Browser not initialized".to_string()))
    }

    async fn update_text(&self) -> Result<String, ScraperError> {
        let session = self.session()?;
        info!("Navigating to IAF summary...");
        if let Err(e) = session.goto(SUMMARY_URL).await {
            // SPAのため goto がエラーでも描画されることがある
            warn!("Navigation warning: {}", e);
        }
        sleep(Duration::from_secs(3)).await;

        let ready = format!("({}) !== null", UPDATE_TEXT_SCRIPT.trim());
        session
            .wait_until(&ready, Duration::from_secs(15), "update date")
            .await?;

        let text: Option<String> = session.evaluate(UPDATE_TEXT_SCRIPT).await?;
        let text = text.unwrap_or_default();
        info!("Update text found: '{}'", text);
        Ok(text)
    }
}

#[async_trait]
impl Scraper for IafScraper {
    type Output = UpdateCheck;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.session = Some(BrowserSession::launch(&self.config.scraper).await?);
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        extranet::login(self.session()?, &self.config.credentials).await
    }

    async fn extract(&mut self) -> Result<UpdateCheck, ScraperError> {
        let result = self.update_text().await;
        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "iaf").await;
        }

        let check = UpdateCheck::evaluate(result?, Local::now().date_naive());
        if check.updated_today {
            info!("IAF dashboard was updated today");
        } else {
            info!(
                "IAF dashboard not updated today (last update: {:?})",
                check.updated_on
            );
        }
        Ok(check)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}
