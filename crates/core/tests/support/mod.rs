//! Shared test helpers for `cacheflow-core` integration tests.
//!
//! These helpers provide in-memory backends and an engine fixture so tests
//! can focus on caching behaviour instead of wiring.

#![allow(dead_code)]

pub mod stores;

use std::sync::Arc;

use cacheflow_common::time::MockClock;
use cacheflow_core::{CacheEngine, ExpirationSweeper};
use cacheflow_domain::AdmissionTuning;

pub use stores::{MockLocalStore, MockRemoteStore};

/// Engine wired to mock backends that share one mock clock
pub struct Fixture {
    pub clock: MockClock,
    pub local: MockLocalStore,
    pub remote: MockRemoteStore,
    pub engine: CacheEngine<MockClock>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_tuning(AdmissionTuning::default())
    }

    pub fn with_tuning(tuning: AdmissionTuning) -> Self {
        let clock = MockClock::new();
        let local = MockLocalStore::new(clock.clone());
        let remote = MockRemoteStore::new(clock.clone());
        let engine = CacheEngine::with_clock(tuning, clock.clone())
            .with_local_store(Arc::new(local.clone()))
            .with_remote_store(Arc::new(remote.clone()));

        Self { clock, local, remote, engine }
    }

    /// Sweeper over the fixture's local and remote stores
    pub fn sweeper(&self) -> ExpirationSweeper<MockClock> {
        let local = Arc::new(self.local.clone());
        ExpirationSweeper::with_clock(local, self.engine.metrics(), self.clock.clone())
            .with_remote_store(Arc::new(self.remote.clone()))
    }
}

/// Computation that always succeeds with `value`
pub async fn ok<T>(value: T) -> Result<T, String> {
    Ok(value)
}
