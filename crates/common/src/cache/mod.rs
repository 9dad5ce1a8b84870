//! Keyed storage with absolute per-entry deadlines
//!
//! [`ExpiringCache`] backs the process-local cache store. Unlike a TTL cache
//! it never drops entries on read; expired entries stay in place until a
//! sweep removes them with [`ExpiringCache::remove_if_expired`], which lets
//! the caller account for the freed bytes.
//!
//! # Thread Safety
//!
//! Storage sits behind an `Arc<parking_lot::RwLock<_>>`; clones share it.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use cacheflow_common::cache::ExpiringCache;
//!
//! let cache = Arc::new(ExpiringCache::<String, u32>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || cache.insert(format!("key-{i}"), i, u64::MAX))
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(), 4);
//! ```

mod expiring;
mod stats;

pub use expiring::ExpiringCache;
pub use stats::CacheStats;
