//! File-backed local store
//!
//! The whole map is mirrored to a JSON document after every write:
//!
//! ```json
//! { "users": { "data": ["u1", "u2"], "expireAt": 1700000060000 } }
//! ```
//!
//! Writes go through a temp file and a rename, so a crash mid-write leaves
//! the previous document intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_core::LocalStore;
use cacheflow_domain::{CacheEntry, CacheFlowError, CacheFlowResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::persistence::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    data: Value,
    expire_at: u64,
}

impl StoredEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expire_at
    }
}

/// [`LocalStore`] persisted to a single JSON document
pub struct JsonFileLocalStore<C: Clock = SystemClock> {
    path: PathBuf,
    // Held across the file write so documents land in write order.
    entries: Mutex<HashMap<String, StoredEntry>>,
    clock: C,
}

impl JsonFileLocalStore<SystemClock> {
    /// Open the document at `path`, starting empty if it does not exist
    ///
    /// # Errors
    /// Returns `MetricsCorruption` when the file is not a JSON object of
    /// `{data, expireAt}` records, `Io` when it cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> CacheFlowResult<Self> {
        Self::open_with_clock(path, SystemClock).await
    }
}

impl<C: Clock> JsonFileLocalStore<C> {
    /// Open with a custom clock (useful for testing)
    pub async fn open_with_clock(path: impl Into<PathBuf>, clock: C) -> CacheFlowResult<Self> {
        let path = path.into();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_document(&contents, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = entries.len(), "Opened local store document");
        Ok(Self { path, entries: Mutex::new(entries), clock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn persist(&self, entries: &HashMap<String, StoredEntry>) -> CacheFlowResult<()> {
        let bytes = serde_json::to_vec(entries)?;
        write_atomic(&self.path, &bytes).await?;
        debug!(entries = entries.len(), "Local store document written");
        Ok(())
    }
}

fn parse_document(contents: &str, path: &Path) -> CacheFlowResult<HashMap<String, StoredEntry>> {
    serde_json::from_str(contents).map_err(|e| {
        CacheFlowError::MetricsCorruption(format!(
            "local store document {} is malformed: {e}",
            path.display()
        ))
    })
}

#[async_trait]
impl<C: Clock> LocalStore for JsonFileLocalStore<C> {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        let now_ms = self.clock.millis_since_epoch();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|stored| !stored.is_expired(now_ms))
            .map(|stored| CacheEntry::new(key, stored.data.clone(), stored.expire_at)))
    }

    async fn set(&self, entry: CacheEntry) -> CacheFlowResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(entry.key, StoredEntry { data: entry.data, expire_at: entry.expire_at_ms });
        self.persist(&entries).await
    }

    async fn touch(&self, key: &str, expire_at_ms: u64) -> CacheFlowResult<bool> {
        let mut entries = self.entries.lock().await;
        let Some(stored) = entries.get_mut(key) else {
            return Ok(false);
        };
        stored.expire_at = expire_at_ms;
        self.persist(&entries).await?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        let mut entries = self.entries.lock().await;
        let Some(stored) = entries.remove(key) else {
            return Ok(None);
        };
        self.persist(&entries).await?;
        Ok(Some(CacheEntry::new(key, stored.data, stored.expire_at)))
    }

    async fn scan_expired(&self, now_ms: u64) -> CacheFlowResult<Vec<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|(_, stored)| stored.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn remove_expired(&self, key: &str, now_ms: u64) -> CacheFlowResult<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.get(key).is_some_and(|stored| stored.is_expired(now_ms)) {
            return Ok(false);
        }
        entries.remove(key);
        self.persist(&entries).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use cacheflow_common::time::MockClock;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    async fn open(dir: &TempDir, clock: &MockClock) -> JsonFileLocalStore<MockClock> {
        let path = dir.path().join("cache.json");
        JsonFileLocalStore::open_with_clock(path, clock.clone()).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_document_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, &MockClock::new()).await;
        assert!(store.is_empty().await);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let clock = MockClock::new();

        let store = open(&dir, &clock).await;
        store.set(CacheEntry::new("users", json!(["u1", "u2"]), 60_000)).await.unwrap();
        store.set(CacheEntry::new("posts", json!("hello"), 30_000)).await.unwrap();
        assert!(store.touch("posts", 90_000).await.unwrap());
        drop(store);

        let reopened = open(&dir, &clock).await;
        let users = reopened.get("users").await.unwrap().unwrap();
        assert_eq!(users.data, json!(["u1", "u2"]));
        assert_eq!(users.expire_at_ms, 60_000);
        assert_eq!(reopened.get("posts").await.unwrap().unwrap().expire_at_ms, 90_000);
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, &MockClock::new()).await;
        store.set(CacheEntry::new("users", json!([1]), 5_000)).await.unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw, json!({"users": {"data": [1], "expireAt": 5_000}}));
    }

    #[tokio::test]
    async fn test_expired_entries_hidden_then_swept() {
        let dir = TempDir::new().unwrap();
        let clock = MockClock::new();
        let store = open(&dir, &clock).await;
        store.set(CacheEntry::new("users", json!(1), 1_000)).await.unwrap();

        clock.advance_millis(1_001);
        assert!(store.get("users").await.unwrap().is_none());
        assert_eq!(store.scan_expired(1_001).await.unwrap(), vec!["users".to_string()]);
        assert!(store.remove_expired("users", 1_001).await.unwrap());
        assert!(store.is_empty().await);

        let reopened = open(&dir, &clock).await;
        assert!(reopened.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_document_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let err = JsonFileLocalStore::open(&path).await.err().unwrap();
        assert!(matches!(err, CacheFlowError::MetricsCorruption(_)));

        std::fs::write(&path, r#"{"users": {"data": 1}}"#).unwrap();
        let err = JsonFileLocalStore::open(&path).await.err().unwrap();
        assert!(matches!(err, CacheFlowError::MetricsCorruption(_)));
    }
}
