//! Cached values and where they live

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend that holds (or would hold) a key's cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Local,
    #[serde(alias = "redis")]
    Remote,
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A cached value with its absolute expiration deadline
///
/// `expire_at_ms` is wall-clock milliseconds since the UNIX epoch. An entry
/// is expired once the clock is strictly past the deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    #[serde(alias = "expire")]
    pub expire_at_ms: u64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, data: Value, expire_at_ms: u64) -> Self {
        Self { key: key.into(), data, expire_at_ms }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expire_at_ms
    }
}
