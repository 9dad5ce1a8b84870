//! Engine constants
//!
//! Centralized defaults for the admission heuristic, call history and the
//! expiration sweeper.

// Call history
pub const MAX_RECENT_CALLS: usize = 10;

// Admission heuristic defaults
pub const DEFAULT_ADMISSION_THRESHOLD: f64 = 1.0; // calls per second
pub const DEFAULT_SPAN_WEIGHT: f64 = 0.92;
pub const DEFAULT_SPAN_SCALE: f64 = 0.004;
pub const DEFAULT_SIZE_WEIGHT: f64 = 0.17;
pub const DEFAULT_SIZE_SCALE: f64 = 300.0;
pub const DEFAULT_ADMIT_RATIO: f64 = 0.97;
pub const DEFAULT_BASELINE: f64 = 1.0;
pub const DEFAULT_COLD_SPAN_MS: f64 = 10_000.0;
pub const DEFAULT_MIN_SPAN_MS: f64 = 1.0;

// Sweeper
pub const DEFAULT_CHECK_EXPIRE_INTERVAL_SECS: u64 = 10;

// Remote store
pub const DEFAULT_REMOTE_HOST: &str = "127.0.0.1";
pub const DEFAULT_REMOTE_PORT: u16 = 6379;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 1_000;

// Persistence
pub const METRICS_SNAPSHOT_FILE: &str = "metrics.json";
pub const LOCAL_STORE_FILE: &str = "cache.json";
