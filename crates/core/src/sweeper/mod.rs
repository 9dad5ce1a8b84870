//! Background expiration of local cache entries

pub mod service;

pub use service::{ExpirationSweeper, SweepOutcome, SweepReport, SweepState};
