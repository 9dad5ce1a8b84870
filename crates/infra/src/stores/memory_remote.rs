//! In-process remote store with native TTL semantics
//!
//! Stands in for a shared server when none is configured, and in tests.
//! Entries past their deadline read as absent and are dropped lazily, the
//! way a TTL server expires keys without a client-side sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_core::RemoteStore;
use cacheflow_domain::{CacheFlowError, CacheFlowResult};
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone)]
struct RemoteValue {
    payload: String,
    expire_at_ms: u64,
}

/// In-memory [`RemoteStore`]
///
/// Values are held in their serialized form so that `used_memory_bytes`
/// reports the payload footprint. Clones share storage.
#[derive(Clone)]
pub struct MemoryRemoteStore<C: Clock + Clone = SystemClock> {
    entries: Arc<Mutex<HashMap<String, RemoteValue>>>,
    unavailable: Arc<AtomicBool>,
    clock: C,
}

impl MemoryRemoteStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryRemoteStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> MemoryRemoteStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Make every operation fail with `BackendUnavailable` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Deadline of a live key, in epoch milliseconds
    pub fn deadline(&self, key: &str) -> Option<u64> {
        let now_ms = self.clock.millis_since_epoch();
        let entries = self.entries.lock();
        entries.get(key).map(|value| value.expire_at_ms).filter(|deadline| now_ms <= *deadline)
    }

    fn ensure_available(&self) -> CacheFlowResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheFlowError::BackendUnavailable(
                "remote store is unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn deadline_after(&self, ttl_ms: u64) -> u64 {
        self.clock.millis_since_epoch().saturating_add(ttl_ms)
    }
}

#[async_trait]
impl<C: Clock + Clone> RemoteStore for MemoryRemoteStore<C> {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<Value>> {
        self.ensure_available()?;
        let now_ms = self.clock.millis_since_epoch();

        let payload = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(value) if now_ms > value.expire_at_ms => {
                    entries.remove(key);
                    None
                }
                Some(value) => Some(value.payload.clone()),
                None => None,
            }
        };

        payload.map(|raw| super::decode_remote_payload(key, &raw)).transpose()
    }

    async fn set(&self, key: &str, data: &Value, ttl_ms: u64) -> CacheFlowResult<()> {
        self.ensure_available()?;
        let payload = serde_json::to_string(data)?;
        let expire_at_ms = self.deadline_after(ttl_ms);
        self.entries.lock().insert(key.to_string(), RemoteValue { payload, expire_at_ms });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> CacheFlowResult<bool> {
        self.ensure_available()?;
        let now_ms = self.clock.millis_since_epoch();
        let expire_at_ms = self.deadline_after(ttl_ms);

        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(value) if now_ms <= value.expire_at_ms => {
                value.expire_at_ms = expire_at_ms;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn used_memory_bytes(&self) -> CacheFlowResult<u64> {
        self.ensure_available()?;
        let now_ms = self.clock.millis_since_epoch();
        let mut entries = self.entries.lock();
        entries.retain(|_, value| now_ms <= value.expire_at_ms);
        Ok(entries.values().map(|value| value.payload.len() as u64).sum())
    }
}
