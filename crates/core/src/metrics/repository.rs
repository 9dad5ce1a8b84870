//! Per-key metric store plus the global rollups
//!
//! Lock order is always key entry first, then the global aggregator, and the
//! key entry is released before the aggregator is taken. No lock is held
//! across an await point.

use cacheflow_domain::{
    CacheFlowResult, GlobalMetrics, Latency, MetricsSnapshot, ResolverMetric, StorageLocation,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::aggregator::{delta_for, GlobalAggregator};
use crate::admission::AdmissionDecision;

/// One observed call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallSample {
    pub latency: Latency,
    pub location: StorageLocation,
    /// Payload size; applied on a key's first call and on mutations
    pub data_size_bytes: Option<u64>,
    pub mutation: bool,
}

impl CallSample {
    pub fn cached(latency_ms: f64, location: StorageLocation) -> Self {
        Self::new(Latency::Cached(latency_ms), location)
    }

    pub fn uncached(latency_ms: f64, location: StorageLocation) -> Self {
        Self::new(Latency::Uncached(latency_ms), location)
    }

    fn new(latency: Latency, location: StorageLocation) -> Self {
        Self { latency, location, data_size_bytes: None, mutation: false }
    }

    #[must_use]
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.data_size_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn as_mutation(mut self) -> Self {
        self.mutation = true;
        self
    }
}

/// Result of [`MetricsRepository::record_call`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The key's metric after this call
    pub metric: ResolverMetric,
    pub first_call: bool,
}

/// Shared store of every [`ResolverMetric`] and the [`GlobalMetrics`]
#[derive(Debug, Default)]
pub struct MetricsRepository {
    resolvers: DashMap<String, ResolverMetric>,
    global: RwLock<GlobalAggregator>,
}

impl MetricsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call for `key` and update the global rollups
    pub fn record_call(&self, key: &str, sample: CallSample, now_ms: u64) -> RecordedCall {
        let (metric, first_call, delta) = match self.resolvers.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let mut metric = ResolverMetric::first_call(key, now_ms, sample.location);
                metric.record_latency(sample.latency);

                let size = sample.data_size_bytes.unwrap_or(0);
                metric.data_size_bytes = size;
                let local_delta =
                    if sample.location == StorageLocation::Local { to_delta(size) } else { 0 };

                let span = metric.average_call_span;
                let delta = delta_for(&metric, sample.latency, span, local_delta);
                let metric = vacant.insert(metric).clone();
                (metric, true, delta)
            }
            Entry::Occupied(mut occupied) => {
                let metric = occupied.get_mut();
                let previous_span = metric.average_call_span;
                metric.record_call(now_ms);
                metric.record_latency(sample.latency);

                let mut local_delta = 0;
                if let (true, Some(size)) = (sample.mutation, sample.data_size_bytes) {
                    let previous = metric.data_size_bytes;
                    metric.data_size_bytes = size;
                    if sample.location == StorageLocation::Local {
                        local_delta = to_delta(size) - to_delta(previous);
                    }
                }

                let delta = delta_for(metric, sample.latency, previous_span, local_delta);
                (metric.clone(), false, delta)
            }
        };

        let unique = self.resolvers.len() as u64;
        self.global.write().apply(&delta, unique);

        debug!(key, first_call, call_count = metric.call_count, "Recorded call");
        RecordedCall { metric, first_call }
    }

    /// Fold an admission outcome into the metrics
    pub fn record_admission(&self, key: &str, decision: &AdmissionDecision, baseline: f64) {
        match decision {
            AdmissionDecision::Heuristic { score } => {
                if let Some(mut metric) = self.resolvers.get_mut(key) {
                    metric.admission_score = Some(*score);
                }
                self.global.write().record_heuristic_admission(*score, baseline);
            }
            AdmissionDecision::Frequency { .. } => self.global.write().record_frequency_admission(),
            AdmissionDecision::Rejected { .. } => self.global.write().record_rejection(),
        }
    }

    /// Zero a swept key's recorded size and subtract it from the local
    /// total in one step; returns the freed bytes
    pub fn release_key_bytes(&self, key: &str) -> u64 {
        let freed = self
            .resolvers
            .get_mut(key)
            .map(|mut metric| std::mem::take(&mut metric.data_size_bytes))
            .unwrap_or(0);

        if freed > 0 {
            self.global.write().release_local_bytes(freed);
        }
        freed
    }

    /// Overwrite the observed remote memory usage
    pub fn set_remote_bytes(&self, bytes: u64) {
        self.global.write().set_remote_bytes(bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolvers.contains_key(key)
    }

    pub fn resolver(&self, key: &str) -> Option<ResolverMetric> {
        self.resolvers.get(key).map(|metric| metric.clone())
    }

    pub fn global(&self) -> GlobalMetrics {
        self.global.read().metrics().clone()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Copy every metric, sorted by key
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut resolvers: Vec<ResolverMetric> =
            self.resolvers.iter().map(|entry| entry.value().clone()).collect();
        resolvers.sort_by(|a, b| a.key.cmp(&b.key));

        let mut global = self.global();
        // A key inserted by a concurrent call may not be folded in yet.
        global.unique_resolvers = resolvers.len() as u64;

        MetricsSnapshot { global, resolvers }
    }

    /// Replace every metric with a validated snapshot
    ///
    /// # Errors
    /// Returns `MetricsCorruption` when the snapshot fails validation; the
    /// repository is left unchanged in that case.
    pub fn restore(&self, snapshot: MetricsSnapshot) -> CacheFlowResult<()> {
        snapshot.validate()?;

        let aggregator = GlobalAggregator::from_snapshot(&snapshot);
        let mut global = self.global.write();
        self.resolvers.clear();
        for metric in snapshot.resolvers {
            self.resolvers.insert(metric.key.clone(), metric);
        }
        *global = aggregator;
        Ok(())
    }
}

fn to_delta(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
