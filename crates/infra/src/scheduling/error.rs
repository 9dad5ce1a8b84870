//! Scheduler error types

use std::time::Duration;

use cacheflow_domain::CacheFlowError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Tick interval must be non-zero
    #[error("Invalid tick interval: {0:?}")]
    InvalidInterval(Duration),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for CacheFlowError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidInterval(_) => Self::InvalidConfig(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
