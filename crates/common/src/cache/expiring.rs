//! Deadline-based keyed store
//!
//! Every entry carries an absolute deadline in milliseconds since the UNIX
//! epoch. Reads never return an entry past its deadline, but they do not
//! remove it either: removal is left to [`ExpiringCache::remove_if_expired`]
//! so whoever sweeps the store can account for what it frees.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Thread-safe keyed store with per-entry deadlines
///
/// Clones share storage, statistics and clock.
///
/// # Example
/// ```
/// use cacheflow_common::cache::ExpiringCache;
/// use cacheflow_common::time::MockClock;
///
/// let clock = MockClock::new();
/// let cache: ExpiringCache<String, i32, MockClock> = ExpiringCache::with_clock(clock.clone());
///
/// cache.insert("key".to_string(), 42, 1_000);
/// assert_eq!(cache.get(&"key".to_string()), Some(42));
///
/// clock.advance_millis(1_001);
/// assert_eq!(cache.get(&"key".to_string()), None);
/// assert_eq!(cache.remove_if_expired(&"key".to_string(), 1_001), Some(42));
/// ```
pub struct ExpiringCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> ExpiringCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, V> Default for ExpiringCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> ExpiringCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    /// Create an empty store with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            metrics: MetricsCollector::new(),
            clock,
        }
    }

    /// Insert or overwrite an entry with an absolute deadline
    pub fn insert(&self, key: K, value: V, expires_at_ms: u64) {
        self.storage.write().insert(key, CacheEntry { value, expires_at_ms });
        self.metrics.record_insert();
    }

    /// Get a live value
    ///
    /// Returns `None` for unknown keys and for entries whose deadline has
    /// passed.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_deadline(key).map(|(value, _)| value)
    }

    /// Get a live value together with its deadline
    pub fn get_with_deadline(&self, key: &K) -> Option<(V, u64)> {
        let now_ms = self.clock.millis_since_epoch();
        let storage = self.storage.read();

        match storage.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => {
                self.metrics.record_hit();
                Some((entry.value.clone(), entry.expires_at_ms))
            }
            _ => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Move the deadline of an existing entry
    ///
    /// Returns `false` when the key is unknown. Entries past their deadline
    /// that have not been swept yet are revived.
    pub fn touch(&self, key: &K, expires_at_ms: u64) -> bool {
        let mut storage = self.storage.write();
        match storage.get_mut(key) {
            Some(entry) => {
                entry.expires_at_ms = expires_at_ms;
                self.metrics.record_refresh();
                true
            }
            None => false,
        }
    }

    /// Remove an entry regardless of its deadline
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.storage.write().remove(key).map(|entry| entry.value);
        if removed.is_some() {
            self.metrics.record_removal();
        }
        removed
    }

    /// Remove an entry only if its deadline is before `now_ms`
    ///
    /// The deadline check and the removal happen under one write lock, so an
    /// entry refreshed concurrently is never dropped.
    pub fn remove_if_expired(&self, key: &K, now_ms: u64) -> Option<V> {
        let mut storage = self.storage.write();
        let expired = storage.get(key).is_some_and(|entry| entry.is_expired(now_ms));
        if !expired {
            return None;
        }

        self.metrics.record_expiration();
        storage.remove(key).map(|entry| entry.value)
    }

    /// Keys whose deadline is before `now_ms`
    pub fn expired_keys(&self, now_ms: u64) -> Vec<K> {
        self.storage
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Copy of every entry with its deadline, live or not
    pub fn entries(&self) -> Vec<(K, V, u64)> {
        self.storage
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone(), entry.expires_at_ms))
            .collect()
    }

    /// Current number of entries, including unswept expired ones
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry and reset statistics
    pub fn clear(&self) {
        self.storage.write().clear();
        self.metrics.reset();
    }

    /// Get store statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }
}

impl<K, V, C> Clone for ExpiringCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
        }
    }
}
