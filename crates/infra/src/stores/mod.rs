//! Backend adapters for the core store ports
//!
//! - [`MemoryLocalStore`]: process memory, deadline-based
//! - [`JsonFileLocalStore`]: process memory mirrored to a JSON document
//! - [`MemoryRemoteStore`]: in-process TTL store
//! - `RedisRemoteStore`: Redis server (feature `redis`)

use cacheflow_domain::{CacheFlowError, CacheFlowResult};
use serde_json::Value;

pub mod json_file_local;
pub mod memory_local;
pub mod memory_remote;
#[cfg(feature = "redis")]
pub mod redis_remote;

pub use json_file_local::JsonFileLocalStore;
pub use memory_local::MemoryLocalStore;
pub use memory_remote::MemoryRemoteStore;
#[cfg(feature = "redis")]
pub use redis_remote::RedisRemoteStore;

/// Parse a stored remote payload; a payload that is not JSON is corrupt
pub(crate) fn decode_remote_payload(key: &str, raw: &str) -> CacheFlowResult<Value> {
    serde_json::from_str(raw).map_err(|e| {
        CacheFlowError::MetricsCorruption(format!(
            "remote payload for {key} is not valid JSON: {e}"
        ))
    })
}
