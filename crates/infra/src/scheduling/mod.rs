//! Background scheduling
//!
//! Provides the interval-driven [`SweepScheduler`] that runs expiration
//! sweeps over the local store.

pub mod error;
pub mod sweep_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sweep_scheduler::{SweepScheduler, SweepSchedulerConfig};
