//! Expiration sweeper
//!
//! One tick purges every expired local entry. Each removal zeroes the
//! matching metric's size and subtracts it from the local total before the
//! next await point, so a tick dropped mid-pass leaves the accounting
//! consistent. When a remote store is configured its memory usage is
//! re-read once per tick.
//!
//! The sweeper is non-reentrant: a tick that starts while another is
//! running returns [`SweepOutcome::Skipped`] immediately.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_domain::CacheFlowResult;
use tracing::{debug, instrument, warn};

use crate::cache::ports::{LocalStore, RemoteStore};
use crate::metrics::MetricsRepository;

const IDLE: u8 = 0;
const SWEEPING: u8 = 1;

/// Sweeper state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping,
}

/// What one completed sweep did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub expired_keys: Vec<String>,
    pub freed_bytes: u64,
    /// Remote memory usage read after the pass, if a remote store exists
    /// and answered
    pub remote_used_memory: Option<u64>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another sweep was already running
    Skipped,
    Completed(SweepReport),
}

/// Purges expired local entries and reconciles size accounting
pub struct ExpirationSweeper<C: Clock = SystemClock> {
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    metrics: Arc<MetricsRepository>,
    clock: C,
    state: AtomicU8,
}

impl ExpirationSweeper<SystemClock> {
    pub fn new(local: Arc<dyn LocalStore>, metrics: Arc<MetricsRepository>) -> Self {
        Self::with_clock(local, metrics, SystemClock)
    }
}

impl<C: Clock> ExpirationSweeper<C> {
    /// Create a sweeper with a custom clock (useful for testing)
    pub fn with_clock(
        local: Arc<dyn LocalStore>,
        metrics: Arc<MetricsRepository>,
        clock: C,
    ) -> Self {
        Self { local, remote: None, metrics, clock, state: AtomicU8::new(IDLE) }
    }

    pub fn with_remote_store(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn state(&self) -> SweepState {
        match self.state.load(Ordering::Acquire) {
            SWEEPING => SweepState::Sweeping,
            _ => SweepState::Idle,
        }
    }

    /// Run one sweep pass unless one is already in progress
    ///
    /// Individual removal failures are logged and skipped; a failed remote
    /// memory query leaves the remote total unchanged.
    ///
    /// # Errors
    /// Returns the local store's error when expired keys cannot be listed.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> CacheFlowResult<SweepOutcome> {
        let Some(_guard) = SweepGuard::acquire(&self.state) else {
            debug!("Sweep already in progress, skipping tick");
            return Ok(SweepOutcome::Skipped);
        };

        let started = self.clock.now();
        let now_ms = self.clock.millis_since_epoch();
        let mut report = SweepReport::default();

        for key in self.local.scan_expired(now_ms).await? {
            match self.local.remove_expired(&key, now_ms).await {
                Ok(true) => {
                    report.freed_bytes += self.metrics.release_key_bytes(&key);
                    report.expired_keys.push(key);
                }
                Ok(false) => {}
                Err(err) => warn!(key = %key, error = %err, "Failed to remove expired entry"),
            }
        }

        if let Some(remote) = &self.remote {
            match remote.used_memory_bytes().await {
                Ok(bytes) => {
                    self.metrics.set_remote_bytes(bytes);
                    report.remote_used_memory = Some(bytes);
                }
                Err(err) => warn!(error = %err, "Failed to read remote memory usage"),
            }
        }

        report.duration = self.clock.now().saturating_duration_since(started);
        debug!(
            expired = report.expired_keys.len(),
            freed_bytes = report.freed_bytes,
            "Sweep completed"
        );
        Ok(SweepOutcome::Completed(report))
    }
}

/// Holds the sweeper in `Sweeping` until dropped
struct SweepGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> SweepGuard<'a> {
    fn acquire(state: &'a AtomicU8) -> Option<Self> {
        state
            .compare_exchange(IDLE, SWEEPING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { state })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sweeper::service.
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_released_on_drop() {
        let state = AtomicU8::new(IDLE);

        let guard = SweepGuard::acquire(&state);
        assert!(guard.is_some());
        assert!(SweepGuard::acquire(&state).is_none());

        drop(guard);
        assert!(SweepGuard::acquire(&state).is_some());
        assert_eq!(state.load(Ordering::Acquire), IDLE);
    }
}
