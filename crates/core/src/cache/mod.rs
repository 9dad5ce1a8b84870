//! Cache orchestration and backend ports

pub mod engine;
pub mod ports;

pub use engine::CacheEngine;
pub use ports::{LocalStore, RemoteStore};
