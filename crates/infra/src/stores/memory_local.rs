//! Process-local store over [`ExpiringCache`]

use async_trait::async_trait;
use cacheflow_common::cache::{CacheStats, ExpiringCache};
use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_core::LocalStore;
use cacheflow_domain::{CacheEntry, CacheFlowResult};
use serde_json::Value;

/// In-memory [`LocalStore`]
///
/// Entries past their deadline read as absent but stay in place until the
/// sweeper removes them. Clones share storage.
#[derive(Clone)]
pub struct MemoryLocalStore<C: Clock + Clone = SystemClock> {
    entries: ExpiringCache<String, Value, C>,
}

impl MemoryLocalStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryLocalStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> MemoryLocalStore<C> {
    /// Create a store with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: ExpiringCache::with_clock(clock) }
    }

    /// Number of entries, including unswept expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss/expiration counters of the underlying store
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

#[async_trait]
impl<C: Clock + Clone> LocalStore for MemoryLocalStore<C> {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        Ok(self
            .entries
            .get_with_deadline(&key.to_string())
            .map(|(data, expire_at_ms)| CacheEntry::new(key, data, expire_at_ms)))
    }

    async fn set(&self, entry: CacheEntry) -> CacheFlowResult<()> {
        self.entries.insert(entry.key, entry.data, entry.expire_at_ms);
        Ok(())
    }

    async fn touch(&self, key: &str, expire_at_ms: u64) -> CacheFlowResult<bool> {
        Ok(self.entries.touch(&key.to_string(), expire_at_ms))
    }

    async fn delete(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        let key = key.to_string();
        let deadline =
            self.entries.entries().into_iter().find(|(k, _, _)| *k == key).map(|(_, _, d)| d);
        let removed = self.entries.remove(&key);
        Ok(removed.map(|data| CacheEntry::new(key, data, deadline.unwrap_or_default())))
    }

    async fn scan_expired(&self, now_ms: u64) -> CacheFlowResult<Vec<String>> {
        Ok(self.entries.expired_keys(now_ms))
    }

    async fn remove_expired(&self, key: &str, now_ms: u64) -> CacheFlowResult<bool> {
        Ok(self.entries.remove_if_expired(&key.to_string(), now_ms).is_some())
    }
}
