//! Mooz Cartões スクレイパー実装
//!
//! 加盟店ごとに入金カレンダーを開き、当月と翌月の日別データを取得する

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::browser::{js_string, BrowserSession};
use crate::error::ScraperError;
use crate::traits::Scraper;

use super::types::{
    merchant_id_from_testid, select_button_selector, MoozCalendar, MoozConfig, RawCalendar,
};

const LOGIN_URL: &str = "https://portal.portalmoozcartoes.com.br/autenticacao";
const PAYMENTS_URL: &str = "https://portal.portalmoozcartoes.com.br/payments";
const SELECT_MERCHANT_URL: &str =
    "https://portal.portalmoozcartoes.com.br/selecionar-estabelecimento";

const MERCHANT_ITEM: &str = "div[data-testid='merchant-item']";
const CALENDAR_CONTENT: &str = "div._monthDaysContent_hcl7j_55";
const CALENDAR_HEADER: &str = "div._currentMonth_hcl7j_6 span";
const NEXT_MONTH_BUTTON: &str = "button._pagination_hcl7j_37 path[d='m9 18 6-6-6-6']";

const EXTRACT_CALENDAR_SCRIPT: &str = r#"
    (() => {
        const headerEl = document.querySelector('div._currentMonth_hcl7j_6 span');
        const cells = [];
        document.querySelectorAll('button._monthDayItem_hcl7j_61').forEach(btn => {
            const dayEl = btn.querySelector('p._numberDay_hcl7j_81');
            if (!dayEl) return;
            const day = parseInt(dayEl.textContent.trim(), 10);
            if (Number.isNaN(day)) return;
            const titleEl = btn.querySelector('p._Title_slpts_32');
            const valueEl = btn.querySelector('span._Value_slpts_36');
            cells.push({
                day,
                status: titleEl ? titleEl.textContent.trim() : null,
                value: valueEl ? valueEl.textContent.trim() : null,
                has_data: !!(titleEl && valueEl)
            });
        });
        return { header: headerEl ? headerEl.textContent.trim() : '', cells };
    })()
"#;

const MERCHANT_TESTIDS_SCRIPT: &str = r#"
    Array.from(document.querySelectorAll("div[data-testid='merchant-item'] button[data-testid^='select-button-']"))
        .map(b => b.getAttribute('data-testid') || '')
"#;

/// Mooz Cartões スクレイパー
pub struct MoozScraper {
    config: MoozConfig,
    session: Option<BrowserSession>,
}

impl MoozScraper {
    pub fn new(config: MoozConfig) -> Self {
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

    async fn open_merchant_list(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Opening merchant list...");
        session.click_text("button", "Estabelecimentos").await?;
        session
            .wait_for_selector(MERCHANT_ITEM, Duration::from_secs(5))
            .await
    }

    /// 選択可能な加盟店IDの一覧
    pub async fn merchant_ids(&self) -> Result<Vec<String>, ScraperError> {
        self.open_merchant_list().await?;

        let testids: Vec<String> = self.session()?.evaluate(MERCHANT_TESTIDS_SCRIPT).await?;
        let ids: Vec<String> = testids
            .iter()
            .filter_map(|t| merchant_id_from_testid(t))
            .map(str::to_string)
            .collect();

        info!("Found {} merchants: {:?}", ids.len(), ids);
        Ok(ids)
    }

    async fn select_merchant(&self, merchant_id: &str) -> Result<(), ScraperError> {
        let session = self.session()?;
        let selector = select_button_selector(merchant_id);
        info!("Selecting merchant {}...", merchant_id);

        if !session.exists(&selector).await {
            info!("Button for {} not visible, opening merchant list...", merchant_id);
            self.open_merchant_list().await?;
        }
        sleep(Duration::from_millis(500)).await;

        session.click(&selector).await?;
        session.wait_request_idle().await?;
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn back_to_merchant_selection(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        session.goto(SELECT_MERCHANT_URL).await?;
        session.wait_request_idle().await?;
        session
            .wait_for_text("Estabelecimentos", Duration::from_secs(10))
            .await
    }

    /// 表示中のカレンダーを抽出
    async fn extract_calendar(&self, merchant_id: &str) -> Result<MoozCalendar, ScraperError> {
        let session = self.session()?;
        info!("Extracting calendar data...");
        session
            .wait_for_selector(CALENDAR_CONTENT, Duration::from_secs(10))
            .await?;
        session.wait_stable().await?;

        let raw: RawCalendar = session.evaluate(EXTRACT_CALENDAR_SCRIPT).await?;
        info!("Calendar header '{}' with {} cells", raw.header, raw.cells.len());

        MoozCalendar::from_raw(merchant_id, &raw, Local::now().naive_local())
    }

    /// 翌月へ移動し、ヘッダーが切り替わるまで待つ
    async fn next_month(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Navigating to next month...");

        let header: String = session
            .evaluate(&format!(
                "(document.querySelector({})?.textContent || '').trim()",
                js_string(CALENDAR_HEADER)
            ))
            .await?;

        let clicked: bool = session
            .evaluate(&format!(
                "(() => {{ const p = document.querySelector({}); const b = p && p.closest('button'); if (!b) return false; b.click(); return true; }})()",
                js_string(NEXT_MONTH_BUTTON)
            ))
            .await?;
        if !clicked {
            return Err(ScraperError::ElementNotFound(
                "next month button".to_string(),
            ));
        }

        let changed = format!(
            "(document.querySelector({})?.textContent || '').trim() !== {}",
            js_string(CALENDAR_HEADER),
            js_string(&header)
        );
        session
            .wait_until(&changed, Duration::from_secs(10), "calendar header change")
            .await?;
        session.wait_request_idle().await?;
        Ok(())
    }

    async fn extract_all(&self) -> Result<Vec<MoozCalendar>, ScraperError> {
        let ids = self.merchant_ids().await?;
        if ids.is_empty() {
            warn!("No merchants available for this account");
        }

        let mut calendars = Vec::new();
        for merchant_id in &ids {
            info!("Processing merchant {}", merchant_id);
            self.select_merchant(merchant_id).await?;

            let session = self.session()?;
            session.goto(PAYMENTS_URL).await?;
            session.wait_request_idle().await?;

            for i in 0..self.config.months {
                if i > 0 {
                    self.next_month().await?;
                }
                let calendar = self.extract_calendar(merchant_id).await?;
                info!(
                    "Merchant {} {}: {} days",
                    merchant_id,
                    calendar.period,
                    calendar.days.len()
                );
                calendars.push(calendar);
            }

            self.back_to_merchant_selection().await?;
        }

        Ok(calendars)
    }
}

#[async_trait]
impl Scraper for MoozScraper {
    type Output = Vec<MoozCalendar>;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.session = Some(BrowserSession::launch(&self.config.scraper).await?);
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Logging in to Mooz Cartões...");

        session.goto(LOGIN_URL).await?;
        session.wait_request_idle().await?;
        session
            .wait_for_selector("#username", self.config.scraper.timeout)
            .await?;

        session
            .fill("#username", &self.config.credentials.user)
            .await?;
        session
            .fill("#password", &self.config.credentials.password)
            .await?;
        sleep(Duration::from_millis(500)).await;

        session.click_text("button", "Entrar").await?;
        session.wait_request_idle().await?;
        sleep(Duration::from_secs(5)).await;

        let url = session.current_url().await;
        info!("Post-login URL: {}", url);
        if url.starts_with(LOGIN_URL) && session.exists("#password").await {
            return Err(ScraperError::Login(
                "ログイン後もログイン画面のままです".to_string(),
            ));
        }
        Ok(())
    }

    async fn extract(&mut self) -> Result<Vec<MoozCalendar>, ScraperError> {
        let result = self.extract_all().await;
        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "mooz").await;
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
