//! Domain types and models

pub mod entry;
pub mod metrics;
pub mod snapshot;

pub use entry::{CacheEntry, StorageLocation};
pub use metrics::{CallSpan, GlobalMetrics, Latency, ResolverMetric};
pub use snapshot::MetricsSnapshot;
