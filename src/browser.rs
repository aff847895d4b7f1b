//! ブラウザセッション
//!
//! chromiumoxide の `Browser` と作業用の1ページを保持し、
//! 各ポータルで共通の待機・評価・入力処理を提供する。

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// ポーリング間隔（ミリ秒）
const POLL_INTERVAL_MS: u64 = 500;
/// ネットワークアイドル待機のタイムアウト（ミリ秒）
const NETWORK_IDLE_TIMEOUT_MS: u64 = 30000;
/// ページ安定待機のタイムアウト（ミリ秒）
const PAGE_STABLE_TIMEOUT_MS: u64 = 10000;
/// 連続何回アイドル/安定ならOKとするか
const REQUIRED_CONSECUTIVE_CHECKS: u32 = 3;

/// JS文字列リテラルとして埋め込む（引用符・改行をエスケープ）
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn exists_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

fn text_present_script(text: &str) -> String {
    format!(
        "(document.body && document.body.innerText.includes({})) === true",
        js_string(text)
    )
}

fn url_contains_script(fragment: &str) -> String {
    format!("window.location.href.includes({})", js_string(fragment))
}

fn click_script(selector: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({});
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()
    "#,
        js_string(selector)
    )
}

fn click_text_script(selector: &str, text: &str) -> String {
    format!(
        r#"
        (() => {{
            const wanted = {};
            const items = Array.from(document.querySelectorAll({}));
            const el = items.find(e => (e.innerText || e.textContent || '').trim() === wanted)
                || items.find(e => (e.innerText || e.textContent || '').trim().includes(wanted));
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()
    "#,
        js_string(text),
        js_string(selector)
    )
}

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
    timeout: Duration,
    debug: bool,
}

impl BrowserSession {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Initializing browser...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("portal-scraper-{}", unique_id));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(config.resolve_chrome_path())
            .user_data_dir(&user_data_dir)
            .window_size(1920, 1080);

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(config.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--lang=pt-BR");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder.build().map_err(ScraperError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        info!("Browser initialized successfully");
        Ok(Self {
            browser,
            page,
            handler,
            user_data_dir,
            timeout: config.timeout,
            debug: config.debug,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        info!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    /// スクリプトを評価して結果をデシリアライズ
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    /// 戻り値を使わないスクリプト
    pub async fn run(&self, script: &str) -> Result<(), ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(())
    }

    pub async fn current_url(&self) -> String {
        self.evaluate::<String>("window.location.href")
            .await
            .unwrap_or_default()
    }

    pub async fn exists(&self, selector: &str) -> bool {
        self.evaluate::<bool>(&exists_script(selector))
            .await
            .unwrap_or(false)
    }

    /// スクリプトが true を返すまでポーリング
    pub async fn wait_until(
        &self,
        script: &str,
        timeout: Duration,
        what: &str,
    ) -> Result<(), ScraperError> {
        let start = Instant::now();
        let mut i = 0u32;

        while start.elapsed() < timeout {
            match self.evaluate::<bool>(script).await {
                Ok(true) => {
                    debug!("{} ready after {:?}", what, start.elapsed());
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!("Wait check for {} failed: {}", what, e),
            }

            if i > 0 && i % 10 == 0 {
                info!("Waiting for {}... ({:?} elapsed)", what, start.elapsed());
            }
            i += 1;
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        Err(ScraperError::Timeout(format!(
            "{} ({}秒)",
            what,
            timeout.as_secs()
        )))
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        self.wait_until(&exists_script(selector), timeout, selector)
            .await
    }

    /// 要素が消えるまで待機
    pub async fn wait_for_gone(&self, selector: &str, timeout: Duration) -> Result<(), ScraperError> {
        let script = format!("!({})", exists_script(selector));
        self.wait_until(&script, timeout, &format!("{} to disappear", selector))
            .await
    }

    /// ページ本文に文字列が現れるまで待機
    pub async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.wait_until(&text_present_script(text), timeout, &format!("text '{}'", text))
            .await
    }

    /// URLに文字列が含まれるまで待機（リダイレクト完了待ち）
    pub async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.wait_until(
            &url_contains_script(fragment),
            timeout,
            &format!("URL containing '{}'", fragment),
        )
        .await
    }

    pub async fn has_text(&self, text: &str) -> bool {
        self.evaluate::<bool>(&text_present_script(text))
            .await
            .unwrap_or(false)
    }

    pub async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        if self.evaluate::<bool>(&click_script(selector)).await? {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(selector.to_string()))
        }
    }

    /// `selector` に一致する要素のうち、表示テキストが `text` のものをクリック
    pub async fn click_text(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        if self
            .evaluate::<bool>(&click_text_script(selector, text))
            .await?
        {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound(format!(
                "{} '{}'",
                selector, text
            )))
        }
    }

    /// 入力欄をクリアしてからキー入力
    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), ScraperError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScraperError::ElementNotFound(format!("{}: {}", selector, e)))?;

        self.run(&format!(
            "document.querySelector({}).value = ''",
            js_string(selector)
        ))
        .await?;

        element
            .click()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        element
            .type_str(value)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(())
    }

    /// ネットワークリクエストがアイドル状態になるまで待機
    pub async fn wait_request_idle(&self) -> Result<(), ScraperError> {
        debug!("Waiting for network to become idle...");
        let start = Instant::now();
        let timeout = Duration::from_millis(NETWORK_IDLE_TIMEOUT_MS);
        let mut idle_count = 0;

        while start.elapsed() < timeout {
            let result = self
                .evaluate::<bool>(
                    r#"
                    (() => {
                        const entries = performance.getEntriesByType('resource');
                        const now = performance.now();
                        const recent = entries.filter(e => (now - e.startTime) < 500 && e.duration === 0);
                        return recent.length === 0 && document.readyState === 'complete';
                    })()
                "#,
                )
                .await;

            match result {
                Ok(true) => {
                    idle_count += 1;
                    if idle_count >= REQUIRED_CONSECUTIVE_CHECKS {
                        debug!("Network idle after {:?}", start.elapsed());
                        return Ok(());
                    }
                }
                Ok(false) => idle_count = 0,
                Err(e) => {
                    debug!("Network idle check error: {}", e);
                    idle_count = 0;
                }
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        warn!(
            "Network idle timeout after {:?}, proceeding anyway",
            start.elapsed()
        );
        Ok(())
    }

    /// DOMサイズが変化しなくなるまで待機
    pub async fn wait_stable(&self) -> Result<(), ScraperError> {
        debug!("Waiting for page to stabilize...");
        let start = Instant::now();
        let timeout = Duration::from_millis(PAGE_STABLE_TIMEOUT_MS);

        let mut last_len: Option<usize> = None;
        let mut stable_count = 0;

        while start.elapsed() < timeout {
            match self
                .evaluate::<usize>("document.documentElement.outerHTML.length")
                .await
            {
                Ok(len) => {
                    if last_len == Some(len) {
                        stable_count += 1;
                        if stable_count >= REQUIRED_CONSECUTIVE_CHECKS {
                            debug!("Page stable after {:?}", start.elapsed());
                            return Ok(());
                        }
                    } else {
                        stable_count = 0;
                    }
                    last_len = Some(len);
                }
                Err(e) => {
                    debug!("Page stable check error: {}", e);
                    stable_count = 0;
                }
            }

            sleep(Duration::from_millis(300)).await;
        }

        warn!(
            "Page stable timeout after {:?}, proceeding anyway",
            start.elapsed()
        );
        Ok(())
    }

    /// スクリーンショットとHTMLを `<dir>/<label>.png|.html` に保存
    pub async fn dump_debug(&self, dir: &Path, label: &str) -> Result<(PathBuf, PathBuf), ScraperError> {
        std::fs::create_dir_all(dir)?;

        let screenshot = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        let png_path = dir.join(format!("{}.png", label));
        std::fs::write(&png_path, &screenshot)?;

        if self.debug {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("Screenshot: data:image/png;base64,{}", encoded);
        }

        let html = self
            .page
            .content()
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        let html_path = dir.join(format!("{}.html", label));
        std::fs::write(&html_path, html)?;

        info!(
            "Debug dump saved: {} / {}",
            png_path.display(),
            html_path.display()
        );
        Ok((png_path, html_path))
    }

    /// 構造起因のエラーならURLをログに出してダンプを残す
    pub async fn report_failure(&self, err: &ScraperError, dir: &Path, label: &str) {
        if !err.is_structural() {
            return;
        }
        let url = self.current_url().await;
        error!("{} failed at {}: {}", label, url, err);
        if let Err(e) = self.dump_debug(dir, label).await {
            warn!("Failed to save debug dump: {}", e);
        }
    }

    /// ブラウザを閉じて一時ディレクトリを削除
    pub async fn close(mut self) -> Result<(), ScraperError> {
        if let Err(e) = self.browser.close().await {
            debug!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Failed to remove user data dir: {}", e);
        }
        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("it's"), r#""it's""#);
        assert_eq!(js_string("a\"b\nc"), r#""a\"b\nc""#);
    }

    #[test]
    fn test_exists_script() {
        assert_eq!(
            exists_script("button[data-cy='entrar']"),
            r#"document.querySelector("button[data-cy='entrar']") !== null"#
        );
    }

    #[test]
    fn test_click_text_script_embeds_literals() {
        let script = click_text_script("button", "Ver \"mais\"");
        assert!(script.contains(r#"const wanted = "Ver \"mais\"";"#));
        assert!(script.contains(r#"document.querySelectorAll("button")"#));
    }

    #[test]
    fn test_url_contains_script() {
        assert_eq!(
            url_contains_script("jpmorgan.guastitecnologia.com.br"),
            r#"window.location.href.includes("jpmorgan.guastitecnologia.com.br")"#
        );
    }

    #[test]
    fn test_text_present_script() {
        assert!(text_present_script("Código da CS").contains(r#"includes("Código da CS")"#));
    }
}
