use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ログインエラー: {0}")]
    Login(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("データ抽出エラー: {0}")]
    Extraction(String),

    #[error("カレンダー構造が不正です: {0}")]
    MalformedCalendar(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("通知送信失敗: status={status}, body={body}")]
    Notify { status: u16, body: String },
}

impl ScraperError {
    /// ページ構造起因の致命的エラーか（デバッグダンプ対象）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ScraperError::Navigation(_)
                | ScraperError::Timeout(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::Extraction(_)
                | ScraperError::MalformedCalendar(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(ScraperError::Timeout("grid".into()).is_structural());
        assert!(ScraperError::MalformedCalendar("drop".into()).is_structural());
        assert!(!ScraperError::Config("missing".into()).is_structural());
        assert!(!ScraperError::Notify {
            status: 500,
            body: String::new()
        }
        .is_structural());
    }

    #[test]
    fn test_notify_display_contains_body() {
        let err = ScraperError::Notify {
            status: 401,
            body: "invalid apikey".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid apikey"));
    }
}
