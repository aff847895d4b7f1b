//! 前回値カーソルによる新着検出
//!
//! 前回実行時に保存した値（最新フォーム名など）と今回の値を比較し、
//! 初回 / 変更あり / 変更なし を判定する。履歴は持たず直前の値だけを見る。

use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ScraperError;

/// 前回値の保存先
pub trait CursorStore: Send + Sync {
    /// 未保存なら `None`
    fn load(&self) -> Result<Option<String>, ScraperError>;

    fn save(&self, value: &str) -> Result<(), ScraperError>;
}

/// 1行のテキストファイルに保存するカーソル
///
/// 同一ディレクトリの一時ファイルに書いてからリネームするため、
/// 書き込み途中のファイルが読まれることはない。
/// ただしプロセスの同時実行は想定していない（後勝ちになる）。
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<String>, ScraperError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, value: &str) -> Result<(), ScraperError> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(value.trim().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// メモリ上のカーソル（テスト・ドライラン用）
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    value: Mutex<Option<String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<Option<String>, ScraperError> {
        Ok(self.current().filter(|v| !v.is_empty()))
    }

    fn save(&self, value: &str) -> Result<(), ScraperError> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| ScraperError::FileIO(std::io::Error::other("cursor lock poisoned")))?;
        *guard = Some(value.trim().to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    FirstSeen,
    Changed,
    Unchanged,
}

/// 判定結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport<D> {
    pub status: ChangeStatus,
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    /// `Changed` のときだけ取得する詳細
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<D>,
    /// カーソル保存に成功したか（失敗時は次回も同じ変更を検出する）
    pub persisted: bool,
}

impl<D> ChangeReport<D> {
    pub fn requires_notification(&self) -> bool {
        self.status != ChangeStatus::Unchanged
    }
}

/// 前回値と比較し、必要ならカーソルを更新する
///
/// `fetch_detail` は変更ありのときだけ呼ばれる。詳細取得に失敗した場合は
/// カーソルを更新せずにエラーを返す。空の値はカーソルにできないのでエラー。
pub async fn detect_change<S, D, F, Fut>(
    store: &S,
    current: &str,
    fetch_detail: F,
) -> Result<ChangeReport<D>, ScraperError>
where
    S: CursorStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<D, ScraperError>>,
{
    let current = current.trim().to_string();
    if current.is_empty() {
        return Err(ScraperError::Extraction("比較する値が空です".to_string()));
    }
    let previous = store.load()?;

    let (status, detail) = match previous.as_deref() {
        None => {
            info!("First observation: {}", current);
            (ChangeStatus::FirstSeen, None)
        }
        Some(prev) if prev != current => {
            info!("New value detected: {} (previous: {})", current, prev);
            let detail = fetch_detail().await?;
            (ChangeStatus::Changed, Some(detail))
        }
        Some(_) => {
            info!("No change: {}", current);
            return Ok(ChangeReport {
                status: ChangeStatus::Unchanged,
                current,
                previous,
                detail: None,
                persisted: false,
            });
        }
    };

    let persisted = match store.save(&current) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to persist cursor, change will be reported again next run: {}", e);
            false
        }
    };

    Ok(ChangeReport {
        status,
        current,
        previous,
        detail,
        persisted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ReadOnlyStore(Option<String>);

    impl CursorStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<String>, ScraperError> {
            Ok(self.0.clone())
        }

        fn save(&self, _value: &str) -> Result<(), ScraperError> {
            Err(ScraperError::FileIO(std::io::Error::from(
                ErrorKind::PermissionDenied,
            )))
        }
    }

    async fn detail() -> Result<String, ScraperError> {
        Ok("detalhes".to_string())
    }

    #[tokio::test]
    async fn test_first_seen_persists_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("ultimo_formulario.txt"));

        let report = detect_change(&store, "Form A", detail).await.unwrap();

        assert_eq!(report.status, ChangeStatus::FirstSeen);
        assert!(report.detail.is_none());
        assert!(report.persisted);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "Form A");
    }

    #[tokio::test]
    async fn test_unchanged_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        std::fs::write(&path, "Form A\n").unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        let store = FileCursorStore::new(&path);

        let fetched = AtomicBool::new(false);

        let report = detect_change(&store, "Form A", || async {
            fetched.store(true, Ordering::SeqCst);
            detail().await
        })
        .await
        .unwrap();

        assert_eq!(report.status, ChangeStatus::Unchanged);
        assert!(!fetched.load(Ordering::SeqCst));
        assert!(!report.requires_notification());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Form A\n");
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn test_changed_carries_detail_and_persists() {
        let store = MemoryCursorStore::with_value("Form A");

        let report = detect_change(&store, "Form B", detail).await.unwrap();

        assert_eq!(report.status, ChangeStatus::Changed);
        assert_eq!(report.previous.as_deref(), Some("Form A"));
        assert_eq!(report.detail.as_deref(), Some("detalhes"));
        assert!(report.persisted);
        assert_eq!(store.current().as_deref(), Some("Form B"));
    }

    #[tokio::test]
    async fn test_save_failure_still_reports_change() {
        let store = ReadOnlyStore(Some("Form A".to_string()));

        let report = detect_change(&store, "Form B", detail).await.unwrap();

        assert_eq!(report.status, ChangeStatus::Changed);
        assert!(!report.persisted);
        assert!(report.requires_notification());
    }

    #[tokio::test]
    async fn test_detail_failure_keeps_cursor() {
        let store = MemoryCursorStore::with_value("Form A");

        let result = detect_change(&store, "Form B", || async {
            Err::<String, _>(ScraperError::ElementNotFound(".box-pergunta".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(store.current().as_deref(), Some("Form A"));
    }

    #[tokio::test]
    async fn test_blank_current_is_rejected_by_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileCursorStore::new(dir.path().join("cursor.txt"));
        let memory = MemoryCursorStore::new();

        for _ in 0..2 {
            let result = detect_change(&file, "  ", detail).await;
            assert!(matches!(result, Err(ScraperError::Extraction(_))));
            let result = detect_change(&memory, "  ", detail).await;
            assert!(matches!(result, Err(ScraperError::Extraction(_))));
        }

        assert!(!file.path().exists());
        assert_eq!(memory.current(), None);

        // 空文字を直接保存しても未保存と同じ扱い
        memory.save(" ").unwrap();
        assert_eq!(memory.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_empty_content_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        let store = FileCursorStore::new(&path);
        assert_eq!(store.load().unwrap(), None);

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save(" Form C \n").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("Form C"));
    }

    #[test]
    fn test_report_serialization() {
        let report = ChangeReport::<String> {
            status: ChangeStatus::FirstSeen,
            current: "Form A".into(),
            previous: None,
            detail: None,
            persisted: true,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "first_seen");
        assert!(json.get("detail").is_none());
    }
}
