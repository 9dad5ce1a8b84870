//! Configuration loading
//!
//! Builds an [`EngineConfig`](cacheflow_domain::EngineConfig) from
//! environment variables or a TOML/JSON file.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, find_config_file};
