//! In-memory mocks for the backend ports
//!
//! Both mocks read time from a shared `MockClock` so tests control expiry
//! exactly, and both can be switched into a failing mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cacheflow_common::time::{Clock, MockClock};
use cacheflow_core::{LocalStore, RemoteStore};
use cacheflow_domain::{CacheEntry, CacheFlowError, CacheFlowResult};
use parking_lot::Mutex;
use serde_json::Value;

/// Mock `LocalStore` over a `HashMap`
#[derive(Clone)]
pub struct MockLocalStore {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    clock: MockClock,
    fail_writes: Arc<AtomicBool>,
    sets: Arc<AtomicUsize>,
}

impl MockLocalStore {
    pub fn new(clock: MockClock) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            fail_writes: Arc::new(AtomicBool::new(false)),
            sets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Raw entry, expired or not
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> CacheFlowResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheFlowError::Io("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for MockLocalStore {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        let now_ms = self.clock.millis_since_epoch();
        Ok(self.entries.lock().get(key).filter(|entry| !entry.is_expired(now_ms)).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> CacheFlowResult<()> {
        self.check_writable()?;
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn touch(&self, key: &str, expire_at_ms: u64) -> CacheFlowResult<bool> {
        self.check_writable()?;
        let mut entries = self.entries.lock();
        Ok(entries.get_mut(key).map(|entry| entry.expire_at_ms = expire_at_ms).is_some())
    }

    async fn delete(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>> {
        Ok(self.entries.lock().remove(key))
    }

    async fn scan_expired(&self, now_ms: u64) -> CacheFlowResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|entry| entry.is_expired(now_ms))
            .map(|entry| entry.key.clone())
            .collect())
    }

    async fn remove_expired(&self, key: &str, now_ms: u64) -> CacheFlowResult<bool> {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now_ms)) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Mock `RemoteStore` with native TTL
#[derive(Clone)]
pub struct MockRemoteStore {
    entries: Arc<Mutex<HashMap<String, (Value, u64)>>>,
    clock: MockClock,
    unavailable: Arc<AtomicBool>,
    used_memory: Arc<Mutex<u64>>,
}

impl MockRemoteStore {
    pub fn new(clock: MockClock) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            unavailable: Arc::new(AtomicBool::new(false)),
            used_memory: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_used_memory(&self, bytes: u64) {
        *self.used_memory.lock() = bytes;
    }

    /// Deadline of a stored key, in epoch milliseconds
    pub fn deadline(&self, key: &str) -> Option<u64> {
        self.entries.lock().get(key).map(|(_, deadline)| *deadline)
    }

    fn check_available(&self) -> CacheFlowResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheFlowError::BackendUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<Value>> {
        self.check_available()?;
        let now_ms = self.clock.millis_since_epoch();
        Ok(self
            .entries
            .lock()
            .get(key)
            .filter(|(_, deadline)| now_ms <= *deadline)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, data: &Value, ttl_ms: u64) -> CacheFlowResult<()> {
        self.check_available()?;
        let deadline = self.clock.millis_since_epoch() + ttl_ms;
        self.entries.lock().insert(key.to_string(), (data.clone(), deadline));
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> CacheFlowResult<bool> {
        self.check_available()?;
        let deadline = self.clock.millis_since_epoch() + ttl_ms;
        Ok(self.entries.lock().get_mut(key).map(|entry| entry.1 = deadline).is_some())
    }

    async fn used_memory_bytes(&self) -> CacheFlowResult<u64> {
        self.check_available()?;
        Ok(*self.used_memory.lock())
    }
}
