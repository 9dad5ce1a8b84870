//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CacheFlow
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CacheFlowError {
    /// Malformed call-site or engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A mutation named a key that has never been observed
    #[error("No cached entry to mutate for key: {0}")]
    KeyNotFoundForMutation(String),

    /// The backing store could not be reached or timed out
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Persisted metrics or cache documents failed structural validation
    #[error("Metrics corruption: {0}")]
    MetricsCorruption(String),

    /// The caller-supplied computation failed
    #[error("Computation failed: {0}")]
    Compute(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheFlowError {
    /// Whether a caller may reasonably retry the failed call.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

impl From<serde_json::Error> for CacheFlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheFlowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for CacheFlow operations
pub type CacheFlowResult<T> = std::result::Result<T, CacheFlowError>;
