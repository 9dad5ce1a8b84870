//! # CacheFlow Domain
//!
//! Data model for the CacheFlow caching engine.
//!
//! This crate contains:
//! - Cache entries and per-key / global metrics
//! - Domain error types and Result definitions
//! - Call-site and engine configuration structures
//! - Heuristic defaults and the payload size estimator
//!
//! ## Architecture
//! - No dependencies on other CacheFlow crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::estimate_size;
