//! Time utilities and abstractions
//!
//! - **[`clock`]**: real and mock clocks shared by the cache store, the
//!   metrics repository and the expiration sweeper

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
