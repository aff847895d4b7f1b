use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::ScraperError;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub headless: bool,
    /// 要素待機などの上限
    pub timeout: Duration,
    pub output_dir: PathBuf,
    /// 失敗時のスクリーンショット/HTMLダンプ、Chromeの詳細ログ
    pub debug: bool,
    /// 未指定なら `CHROME_PATH` / `CHROMIUM_PATH` / `chromium`
    pub chrome_path: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(60),
            output_dir: PathBuf::from("./extracoes"),
            debug: false,
            chrome_path: None,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// 実行するChromeのパス
    pub fn resolve_chrome_path(&self) -> PathBuf {
        self.chrome_path.clone().unwrap_or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .unwrap_or_else(|_| "chromium".to_string())
                .into()
        })
    }
}

/// ポータルのログイン情報
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// 例: `Credentials::from_env("MOOZ_USER", "MOOZ_PASSWORD")`
    pub fn from_env(user_var: &str, pass_var: &str) -> Result<Self, ScraperError> {
        let get = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ScraperError::Config(format!("{} が設定されていません", name)))
        };
        Ok(Self::new(get(user_var)?, get(pass_var)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// `.env` を読み込む。既に設定済みの環境変数は上書きしない。
/// ファイルが無ければ `false`
pub fn load_dotenv(path: impl AsRef<Path>) -> Result<bool, ScraperError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("Loaded environment from {}", path.display());
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(ScraperError::Config(format!(
            "{} の読み込みに失敗しました: {}",
            path.display(),
            e
        ))),
    }
}
