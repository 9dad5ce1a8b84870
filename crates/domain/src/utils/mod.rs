//! Domain helpers

pub mod size;

pub use size::estimate_size;
