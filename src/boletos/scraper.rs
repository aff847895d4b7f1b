//! Portal Boletos スクレイパー実装

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::BrowserSession;
use crate::calendar::date_range;
use crate::error::ScraperError;
use crate::extranet;
use crate::traits::Scraper;

use super::types::{
    clean_header, rows_to_records, BoletosConfig, BoletosExtraction, PagerInfo, RawGridPage,
};

const PORTAL_URL: &str = "https://extranet.grupoboticario.com.br/mfe/portal-boletos-franqueado";
const CNS_URL: &str = "https://jpmorgan.guastitecnologia.com.br/OBoticario/CNS/CNS001_BRW.aspx";
const CNS_HOST: &str = "jpmorgan.guastitecnologia.com.br";

const INPUT_START_DATE: &str = "#ctl00_ContentBody_txtVenctoInicial";
const INPUT_END_DATE: &str = "#ctl00_ContentBody_txtVenctoFinal";
const BUTTON_FILTER: &str = "#ctl00_ContentBody_btnPesquisar";
const GRID: &str = "#ctl00_ContentBody_gvBRW";
const GRID_POSTBACK_TARGET: &str = "ctl00$ContentBody$gvBRW";

const GRID_ROW_COUNT_SCRIPT: &str = r#"
    (() => {
        const grid = document.querySelector('#ctl00_ContentBody_gvBRW');
        return grid ? grid.querySelectorAll('tr').length : 0;
    })()
"#;

const EXTRACT_GRID_SCRIPT: &str = r#"
    (() => {
        const grid = document.querySelector('#ctl00_ContentBody_gvBRW');
        const result = { headers: [], rows: [], pager: null };
        if (!grid) return result;

        grid.querySelectorAll(':scope > tbody > tr').forEach(tr => {
            if (tr.classList.contains('GridHeader')) {
                // 先頭列は機能アイコン
                result.headers = [...tr.querySelectorAll('th')].slice(1).map(th => th.textContent.trim());
                return;
            }
            if (tr.classList.contains('GridPager')) {
                result.pager = [...tr.querySelectorAll('td > table td')].map(td => ({
                    text: td.textContent.trim(),
                    current: td.querySelector('span') !== null && td.querySelector('a') === null
                }));
                return;
            }
            const tds = tr.querySelectorAll('td');
            if (tds.length < 2) return;
            result.rows.push([...tds].slice(1).map(td => {
                const span = td.querySelector('span');
                return (span ? span.textContent : td.textContent) || '';
            }));
        });
        return result;
    })()
"#;

fn postback_script(page: u32) -> String {
    format!("__doPostBack('{}', 'Page${}')", GRID_POSTBACK_TARGET, page)
}

/// Portal Boletos スクレイパー
pub struct BoletosScraper {
    config: BoletosConfig,
    session: Option<BrowserSession>,
}

impl BoletosScraper {
    pub fn new(config: BoletosConfig) -> Self {
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

    /// ポータルを開き JP Morgan / Guasti へのリダイレクトを待つ
    async fn navigate_to_portal(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Navigating to Portal Boletos...");
        if let Err(e) = session.goto(PORTAL_URL).await {
            warn!("Navigation warning: {}", e);
        }

        info!("Waiting for redirect to JP Morgan/Guasti...");
        if let Err(e) = session.wait_for_url(CNS_HOST, Duration::from_secs(30)).await {
            warn!("Redirect not observed: {}", e);
        }
        sleep(Duration::from_secs(3)).await;
        info!("Portal Boletos loaded: {}", session.current_url().await);
        Ok(())
    }

    async fn navigate_to_cns(&self) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Navigating to CNS page...");
        session.goto(CNS_URL).await?;
        session.wait_request_idle().await?;
        session
            .wait_for_selector(INPUT_START_DATE, Duration::from_secs(15))
            .await?;
        info!("CNS page loaded: {}", session.current_url().await);
        Ok(())
    }

    async fn filter(&self, start_date: &str, end_date: &str) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Filling dates: {} -> {}", start_date, end_date);
        session.fill(INPUT_START_DATE, start_date).await?;
        session.fill(INPUT_END_DATE, end_date).await?;
        sleep(Duration::from_millis(500)).await;

        info!("Clicking Filtrar...");
        session.click(BUTTON_FILTER).await?;
        session.wait_request_idle().await?;
        sleep(Duration::from_secs(3)).await;

        let rows: u32 = session.evaluate(GRID_ROW_COUNT_SCRIPT).await?;
        info!("Filter applied. Grid rows: {}", rows);
        Ok(())
    }

    async fn go_to_page(&self, page: u32) -> Result<(), ScraperError> {
        let session = self.session()?;
        info!("Navigating to grid page {}...", page);
        session.run(&postback_script(page)).await?;
        session.wait_request_idle().await?;
        sleep(Duration::from_secs(2)).await;
        session.wait_for_selector(GRID, Duration::from_secs(15)).await
    }

    async fn extract_all(&self) -> Result<BoletosExtraction, ScraperError> {
        extranet::dismiss_popups(self.session()?).await;
        self.navigate_to_portal().await?;
        self.navigate_to_cns().await?;

        let now = Local::now().naive_local();
        let (start_date, end_date) = date_range(now.date());
        self.filter(&start_date, &end_date).await?;

        let session = self.session()?;
        let mut headers = Vec::new();
        let mut rows = Vec::new();
        let mut pages = 0;

        loop {
            let page: RawGridPage = session.evaluate(EXTRACT_GRID_SCRIPT).await?;
            if headers.is_empty() {
                headers = page.headers.iter().map(|h| clean_header(h)).collect();
            }
            let records = rows_to_records(&headers, &page.rows);
            let pager = PagerInfo::parse(page.pager.as_deref());
            pages += 1;
            info!(
                "Page {}/{}: {} rows",
                pager.current,
                pager.total,
                records.len()
            );
            rows.extend(records);

            let Some(next) = pager.next() else { break };
            if pages >= self.config.max_pages {
                warn!("Stopping at page limit {}", self.config.max_pages);
                break;
            }
            if let Err(e) = self.go_to_page(next).await {
                error!("Failed to navigate to page {}: {}", next, e);
                break;
            }
        }

        if rows.is_empty() {
            warn!("No data found in grid");
        }
        info!("Total extracted: {} rows", rows.len());

        Ok(BoletosExtraction {
            start_date,
            end_date,
            extraction_date: now,
            headers,
            pages,
            rows,
        })
    }
}

#[async_trait]
impl Scraper for BoletosScraper {
    type Output = BoletosExtraction;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        self.session = Some(BrowserSession::launch(&self.config.scraper).await?);
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        extranet::login(self.session()?, &self.config.credentials).await
    }

    async fn extract(&mut self) -> Result<BoletosExtraction, ScraperError> {
        let result = self.extract_all().await;
        if let (Err(e), Some(session)) = (&result, &self.session) {
            let dir = self.config.scraper.output_dir.join("debug");
            session.report_failure(e, &dir, "boletos").await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, ScraperConfig};

    #[test]
    fn test_postback_script() {
        assert_eq!(
            postback_script(3),
            "__doPostBack('ctl00$ContentBody$gvBRW', 'Page$3')"
        );
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let mut scraper = BoletosScraper::new(BoletosConfig::new(Credentials::new("u", "p")));
        assert!(matches!(
            scraper.extract().await,
            Err(ScraperError::BrowserInit(_))
        ));
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: cargo test test_boletos_scraper_live -- --ignored --nocapture
    async fn test_boletos_scraper_live() {
        crate::config::load_dotenv(".env").unwrap();
        let config = BoletosConfig::from_env()
            .expect("LOGIN_EXTRANET / PASS_EXTRANET not set")
            .with_max_pages(2)
            .with_scraper(ScraperConfig::new().with_debug(true));

        let mut scraper = BoletosScraper::new(config);
        let extraction = scraper.execute().await.expect("Boletos scrape failed");

        println!(
            "{} -> {}: {} rows in {} pages",
            extraction.start_date,
            extraction.end_date,
            extraction.rows.len(),
            extraction.pages
        );
    }
}
