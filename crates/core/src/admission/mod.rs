//! Cache admission decisions

pub mod policy;

pub use policy::{AdmissionDecision, AdmissionPolicy};
