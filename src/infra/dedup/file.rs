//! Directory-backed dedup store: one JSON file per delivered transaction.
//!
//! Layout: `<base>/<sanitized address>/<dedup key>.json`. Files are written
//! to a temp path and renamed into place, so a record is either complete or
//! absent after a crash.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::{AppError, DedupKey, DedupStore, NotificationRecord, StoreError, sanitize};

/// Default base directory for dedup records
pub const DEFAULT_DEDUP_DIR: &str = "./processed";

#[derive(Debug, Clone)]
pub struct FileDedupStore {
    dir: PathBuf,
}

impl FileDedupStore {
    /// Store namespaced under `base_dir` for one watched address
    #[must_use]
    pub fn new(base_dir: impl AsRef<Path>, address: &str) -> Self {
        Self {
            dir: base_dir.as_ref().join(sanitize(address)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &DedupKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl DedupStore for FileDedupStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool, AppError> {
        fs::try_exists(self.record_path(key))
            .await
            .map_err(|e| AppError::Store(StoreError::Io(e.to_string())))
    }

    async fn record(&self, key: &DedupKey, record: &NotificationRecord) -> Result<(), AppError> {
        let write_failed = |message: String| {
            AppError::Store(StoreError::RecordWriteFailed {
                key: key.to_string(),
                message,
            })
        };

        let body = serde_json::to_vec_pretty(record).map_err(|e| write_failed(e.to_string()))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let path = self.record_path(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, body)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!(path = %path.display(), "Delivery recorded");
        Ok(())
    }

    async fn get(&self, key: &DedupKey) -> Result<Option<NotificationRecord>, AppError> {
        let bytes = match fs::read(self.record_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Store(StoreError::Io(e.to_string()))),
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            AppError::Store(StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn record(hash: &str) -> NotificationRecord {
        NotificationRecord::new(
            hash,
            DateTime::from_timestamp(1_714_564_800, 0).unwrap(),
            Some("123".to_string()),
            Some("1000".to_string()),
        )
    }

    #[tokio::test]
    async fn test_record_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDedupStore::new(dir.path(), "EQAbc/def");
        let key = DedupKey::from_hash("tx+hash/=");

        assert!(!store.exists(&key).await.unwrap());
        store.record(&key, &record("tx+hash/=")).await.unwrap();
        assert!(store.exists(&key).await.unwrap());

        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded, record("tx+hash/="));
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDedupStore::new(dir.path(), "addr");
        let key = DedupKey::from_hash("tx");

        store.record(&key, &record("tx")).await.unwrap();
        store.record(&key, &record("tx")).await.unwrap();

        assert!(store.exists(&key).await.unwrap());
        let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1, "temp files must not be left behind");
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = DedupKey::from_hash("tx");

        FileDedupStore::new(dir.path(), "addr")
            .record(&key, &record("tx"))
            .await
            .unwrap();

        let reopened = FileDedupStore::new(dir.path(), "addr");
        assert!(reopened.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_addresses_are_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let key = DedupKey::from_hash("tx");

        let first = FileDedupStore::new(dir.path(), "addr-1");
        let second = FileDedupStore::new(dir.path(), "addr-2");
        first.record(&key, &record("tx")).await.unwrap();

        assert!(first.exists(&key).await.unwrap());
        assert!(!second.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDedupStore::new(dir.path(), "addr");
        let key = DedupKey::from_hash("tx");

        assert!(store.get(&key).await.unwrap().is_none());

        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("tx.json"), b"not json").unwrap();
        assert!(matches!(
            store.get(&key).await,
            Err(AppError::Store(StoreError::Corrupt { .. }))
        ));
        // A corrupt file still proves delivery happened
        assert!(store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the namespace directory should be
        std::fs::write(dir.path().join("addr"), b"").unwrap();
        let store = FileDedupStore::new(dir.path(), "addr");

        let result = store
            .record(&DedupKey::from_hash("tx"), &record("tx"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::RecordWriteFailed { .. }))
        ));
    }
}
