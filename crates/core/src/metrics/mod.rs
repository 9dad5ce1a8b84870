//! Call metrics: per-key history and global rollups

mod aggregator;
pub mod repository;

pub use repository::{CallSample, MetricsRepository, RecordedCall};
