//! Calendário CAR スクレイパー実装
//!
//! CSコードと月をフィルタで切り替えながら、合計値と日別の入金予定を取得する

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::calendar::{extraction_periods, month_name_pt, CalendarMonth};
use crate::error::ScraperError;
use crate::extranet;
use crate::traits::Scraper;

use super::types::{CarConfig, CarExtraction, RawCarCalendar};

const CALENDAR_URL: &str =
    "https://extranet.grupoboticario.com.br/mfe/portais-de-credito/portal-do-franqueado/calendario-car";

const CALENDAR: &str = "[data-testid='calendar']";
const LOADING_ICON: &str = "[data-testid='loading-icon']";
const OPTION: &str = "[role='option']";
const SEARCH_ERROR_TEXT: &str = "Não foi possível exibir o resultado da sua pesquisa";

const EXTRACT_CALENDAR_SCRIPT: &str = r#"
    (() => {
        const cal = document.querySelector('[data-testid="calendar"]');
        if (!cal) return { total_recebimentos: null, total_agendamentos: null, days: [] };

        const sibling = (sel) => {
            const icon = cal.querySelector(sel);
            const p = icon ? icon.previousElementSibling : null;
            return p ? p.textContent.trim() : null;
        };

        const dayRe = /^\d{2}-\d{2}-\d{4}$/;
        const days = [];
        cal.querySelectorAll('[data-testid]').forEach(cell => {
            const tid = cell.getAttribute('data-testid');
            if (!dayRe.test(tid)) return;
            const valEl = cell.querySelector('[data-installment-status]');
            if (!valEl) return;
            const titEl = valEl.nextElementSibling;
            days.push({
                date: tid,
                value: valEl.textContent.trim(),
                status: valEl.getAttribute('data-installment-status'),
                titulos: titEl ? titEl.textContent.trim() : ''
            });
        });

        return {
            total_recebimentos: sibling('[data-testid="check-circle-icon"]'),
            total_agendamentos: sibling('[data-testid="calendar-icon"]'),
            days
        };
    })()
"#;

/// Calendário CAR スクレイパー
pub struct CarScraper {
    config: CarConfig,
    session: Option<BrowserSession>,
}

impl CarScraper {
    pub fn new(config: CarConfig) -> Self {
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

    async fn navigate_to_calendar(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Navigating to Calendar CAR...");
        if let Err(e) = session.goto(CALENDAR_URL).await {
            // SPAのため goto がエラーでも描画されることがある
            warn!("Navigation warning: {}", e);
        }

        info!("Waiting for MFE content to render...");
        session
            .wait_for_text("Código da CS", Duration::from_secs(30))
            .await?;
        info!("Calendar page loaded: {}", session.current_url().await);
        Ok(())
    }

    /// コンボボックスを開いて選択肢をクリック
    async fn select_option(&self, button_id: &str, option: &str) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Selecting '{}' in #{}", option, button_id);

        session.click(&format!("#{}", button_id)).await?;
        sleep(Duration::from_millis(500)).await;
        session
            .wait_for_selector(OPTION, Duration::from_secs(5))
            .await?;
        session.click_text(OPTION, option).await?;
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn select_filters(&self, cs_code: &str, period: CalendarMonth) -> Result<(), ScraperError> {
        let month = month_name_pt(period.month).ok_or_else(|| {
            ScraperError::Config(format!("月番号が不正です: {}", period.month))
        })?;
        self.select_option("MediatorCodeDropdown", cs_code).await?;
        self.select_option("month", month).await?;
        self.select_option("year", &period.year.to_string()).await
    }

    /// 検索を実行。エラー表示が出た場合は再試行し、カレンダーが表示されたら true
    async fn search(&self) -> Result<bool, ScraperError> {
        let session = self.session()?;
        let max = self.config.max_search_attempts;

        for attempt in 1..=max {
            info!("Clicking Buscar (attempt {}/{})...", attempt, max);
            session.click_text("button", "Buscar").await?;

            let spinner = session
                .wait_for_selector(LOADING_ICON, Duration::from_secs(5))
                .await;
            match spinner {
                Ok(()) => {
                    if let Err(e) = session
                        .wait_for_gone(LOADING_ICON, Duration::from_secs(30))
                        .await
                    {
                        warn!("Loading icon still visible: {}", e);
                    }
                }
                // 一瞬で消えた、または表示されなかった
                Err(_) => sleep(Duration::from_secs(3)).await,
            }

            if session.has_text(SEARCH_ERROR_TEXT).await {
                warn!("Search error on attempt {}, retrying...", attempt);
                sleep(Duration::from_secs(2)).await;
                continue;
            }

            if session
                .wait_for_selector(CALENDAR, Duration::from_secs(5))
                .await
                .is_ok()
            {
                info!("Calendar loaded successfully");
                return Ok(true);
            }
        }

        error!("Failed to load calendar after {} attempts", max);
        Ok(false)
    }

    async fn extract_period(
        &self,
        cs_code: &str,
        period: CalendarMonth,
    ) -> Result<Option<CarExtraction>, ScraperError> {
        let label = format!("CS={} | {}", cs_code, period.label());
        info!("--- Extracting {} ---", label);

        if let Err(e) = self.select_filters(cs_code, period).await {
            error!("Filter selection failed for {}: {}", label, e);
            return Ok(None);
        }

        if !self.search().await? {
            error!("Calendar did not load for {}", label);
            return Ok(None);
        }

        let session = self.session()?;
        session.wait_stable().await?;
        let raw: RawCarCalendar = session.evaluate(EXTRACT_CALENDAR_SCRIPT).await?;

        let extraction = CarExtraction::from_raw(
            cs_code,
            period,
            raw,
            Local::now().naive_local(),
            &self.config.correction,
        );
        info!(
            "Extracted {} days | Receb={:?} | Agend={:?} | corrected={}",
            extraction.days.len(),
            extraction.total_recebimentos,
            extraction.total_agendamentos,
            extraction.corrected_statuses
        );
        Ok(Some(extraction))
    }

    async fn extract_all(&self) -> Result<Vec<CarExtraction>, ScraperError> {
        self.navigate_to_calendar().await?;
        extranet::dismiss_popups(self.session()?).await;

        let periods = extraction_periods(Local::now().date_naive());
        info!(
            "Periods to extract: {:?}",
            periods.iter().map(|p| p.label()).collect::<Vec<_>>()
        );

        let mut results = Vec::new();
        let mut skipped = 0;
        for cs_code in &self.config.cs_codes {
            for period in &periods {
                match self.extract_period(cs_code, *period).await? {
                    Some(extraction) => results.push(extraction),
                    None => skipped += 1,
                }
            }
        }

        if results.is_empty() && skipped > 0 {
            return Err(ScraperError::Extraction(format!(
                "全ての検索が失敗しました（{}件）",
                skipped
            )));
        }
        if skipped > 0 {
            warn!("{} extractions skipped", skipped);
        }
        Ok(results)
    }
}

#[async_trait]
impl Scraper for CarScraper {
    type Output = Vec<CarExtraction>;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.session = Some(BrowserSession::launch(&self.config.scraper).await?);
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        extranet::login(self.session()?, &self.config.credentials).await
    }

    async fn extract(&mut self) -> Result<Vec<CarExtraction>, ScraperError> {
        let result = self.extract_all().await;
        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "car").await;
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
