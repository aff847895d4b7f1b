use async_trait::async_trait;
use tracing::warn;

use crate::error::ScraperError;

#[async_trait]
pub trait Scraper: Send + Sync {
    /// 抽出結果
    type Output: Send;

    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// ログイン実行
    async fn login(&mut self) -> Result<(), ScraperError>;

    /// データ抽出
    async fn extract(&mut self) -> Result<Self::Output, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 一括実行（initialize → login → extract → close）
    ///
    /// login/extract が失敗してもブラウザは閉じる。
    async fn execute(&mut self) -> Result<Self::Output, ScraperError> {
        self.initialize().await?;

        let result = match self.login().await {
            Ok(()) => self.extract().await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.close().await {
            warn!("Failed to close scraper: {}", e);
        }
        result
    }
}
