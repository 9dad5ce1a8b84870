//! # CacheFlow Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Backend port interfaces (`LocalStore`, `RemoteStore`)
//! - The metrics repository and global aggregation
//! - The admission policy
//! - The cache orchestrator and the expiration sweeper
//!
//! ## Architecture Principles
//! - Only depends on `cacheflow-common` and `cacheflow-domain`
//! - No file, network or timer code
//! - All storage via traits
//! - Pure, testable business logic

pub mod admission;
pub mod cache;
pub mod metrics;
pub mod sweeper;

// Re-export specific items to avoid ambiguity
pub use admission::{AdmissionDecision, AdmissionPolicy};
pub use cache::{CacheEngine, LocalStore, RemoteStore};
pub use metrics::{CallSample, MetricsRepository, RecordedCall};
pub use sweeper::{ExpirationSweeper, SweepOutcome, SweepReport, SweepState};
