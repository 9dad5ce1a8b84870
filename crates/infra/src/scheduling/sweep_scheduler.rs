//! Periodic expiration sweeps.
//!
//! Runs [`ExpirationSweeper::tick`] on a fixed interval in a background task.
//! The join handle is tracked, cancellation is explicit and every tick and
//! join is bounded by a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cacheflow_core::{ExpirationSweeper, MetricsRepository};
//! use cacheflow_infra::scheduling::{SchedulerResult, SweepScheduler, SweepSchedulerConfig};
//! use cacheflow_infra::stores::MemoryLocalStore;
//!
//! # async fn example() -> SchedulerResult<()> {
//! let sweeper = ExpirationSweeper::new(
//!     Arc::new(MemoryLocalStore::new()),
//!     Arc::new(MetricsRepository::new()),
//! );
//! let mut scheduler = SweepScheduler::new(
//!     Arc::new(sweeper),
//!     SweepSchedulerConfig::every(Duration::from_secs(10)),
//! )?;
//!
//! scheduler.start()?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_core::{ExpirationSweeper, SweepOutcome};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepSchedulerConfig {
    /// Time between two sweep ticks.
    pub interval: Duration,
    /// Timeout applied to a single tick.
    pub tick_timeout: Duration,
    /// Timeout for awaiting the background task on stop.
    pub join_timeout: Duration,
}

impl SweepSchedulerConfig {
    /// Default timeouts with a custom interval
    pub fn every(interval: Duration) -> Self {
        Self { interval, ..Self::default() }
    }
}

impl Default for SweepSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            tick_timeout: Duration::from_secs(30),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Sweep scheduler with explicit lifecycle management.
pub struct SweepScheduler<C: Clock = SystemClock> {
    sweeper: Arc<ExpirationSweeper<C>>,
    config: SweepSchedulerConfig,
    handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl<C: Clock> SweepScheduler<C> {
    /// # Errors
    /// Returns [`SchedulerError::InvalidInterval`] for a zero interval.
    pub fn new(
        sweeper: Arc<ExpirationSweeper<C>>,
        config: SweepSchedulerConfig,
    ) -> SchedulerResult<Self> {
        if config.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(config.interval));
        }

        Ok(Self { sweeper, config, handle: None, cancellation: CancellationToken::new() })
    }

    /// Spawn the ticking task. Must be called inside a Tokio runtime.
    #[instrument(skip(self), fields(interval_ms = self.config.interval.as_millis() as u64))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the scheduler can restart after a stop
        self.cancellation = CancellationToken::new();

        let sweeper = Arc::clone(&self.sweeper);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();
        self.handle = Some(tokio::spawn(async move {
            Self::run_loop(sweeper, config, cancel).await;
        }));

        info!("Sweep scheduler started");
        Ok(())
    }

    /// Cancel the ticking task and wait for it to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(handle) = self.handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout(join_timeout))?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Sweep scheduler stopped");
        Ok(())
    }

    /// Returns true when the ticking task is active.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn run_loop(
        sweeper: Arc<ExpirationSweeper<C>>,
        config: SweepSchedulerConfig,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Sweep scheduler cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    Self::run_tick(&sweeper, config.tick_timeout).await;
                }
            }
        }
    }

    async fn run_tick(sweeper: &ExpirationSweeper<C>, tick_timeout: Duration) {
        match tokio::time::timeout(tick_timeout, sweeper.tick()).await {
            Ok(Ok(SweepOutcome::Completed(report))) => {
                debug!(
                    expired = report.expired_keys.len(),
                    freed_bytes = report.freed_bytes,
                    "Sweep tick finished"
                );
            }
            Ok(Ok(SweepOutcome::Skipped)) => {
                debug!("Sweep tick skipped, previous sweep still running");
            }
            Ok(Err(err)) => {
                error!(error = %err, "Sweep tick failed");
            }
            Err(_) => {
                warn!(timeout_ms = tick_timeout.as_millis() as u64, "Sweep tick timed out");
            }
        }
    }
}

impl<C: Clock> Drop for SweepScheduler<C> {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SweepScheduler dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
