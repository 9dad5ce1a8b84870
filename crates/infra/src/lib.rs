//! # CacheFlow Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Local store adapters (in-memory, JSON file)
//! - Remote store adapters (in-process, Redis behind the `redis` feature)
//! - Metrics snapshot persistence
//! - Configuration loading, tracing bootstrap and the sweep scheduler
//!
//! ## Architecture
//! - Implements traits defined in `cacheflow-core`
//! - Contains all "impure" code (file I/O, network, timers)

pub mod config;
pub mod observability;
pub mod persistence;
pub mod runtime;
pub mod scheduling;
pub mod stores;

// Re-export commonly used items
pub use observability::{init_tracing, LogFormat};
pub use persistence::JsonSnapshotStore;
pub use runtime::{initialize, CacheFlowRuntime};
pub use scheduling::{SchedulerError, SchedulerResult, SweepScheduler, SweepSchedulerConfig};
#[cfg(feature = "redis")]
pub use stores::RedisRemoteStore;
pub use stores::{JsonFileLocalStore, MemoryLocalStore, MemoryRemoteStore};
