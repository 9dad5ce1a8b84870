//! Port interfaces for cache backends
//!
//! These traits define the boundaries between the engine and the concrete
//! storage adapters in the infra crate.

use async_trait::async_trait;
use cacheflow_domain::{CacheEntry, CacheFlowResult};
use serde_json::Value;

/// Process-local key/value store without native expiry
///
/// Entries carry absolute deadlines; only the expiration sweeper deletes
/// them.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get a live entry; unknown and expired keys are both absent
    async fn get(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>>;

    /// Insert or overwrite an entry
    async fn set(&self, entry: CacheEntry) -> CacheFlowResult<()>;

    /// Move an entry's deadline; returns `false` when the key is unknown
    async fn touch(&self, key: &str, expire_at_ms: u64) -> CacheFlowResult<bool>;

    /// Remove an entry unconditionally
    async fn delete(&self, key: &str) -> CacheFlowResult<Option<CacheEntry>>;

    /// Keys whose deadline is before `now_ms`
    async fn scan_expired(&self, now_ms: u64) -> CacheFlowResult<Vec<String>>;

    /// Remove `key` only if it is still expired at `now_ms`
    ///
    /// Returns `true` when an entry was removed.
    async fn remove_expired(&self, key: &str, now_ms: u64) -> CacheFlowResult<bool>;
}

/// Network key/value store with native TTL
///
/// Failures surface as `CacheFlowError::BackendUnavailable` and are never
/// retried by the engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<Value>>;

    /// Write a value that the store expires after `ttl_ms`
    async fn set(&self, key: &str, data: &Value, ttl_ms: u64) -> CacheFlowResult<()>;

    /// Reset a key's TTL; returns `false` when the key is unknown
    async fn expire(&self, key: &str, ttl_ms: u64) -> CacheFlowResult<bool>;

    /// Memory currently used by the store, in bytes
    async fn used_memory_bytes(&self) -> CacheFlowResult<u64>;
}
