//! Global rollups recomputed after every recorded call

use cacheflow_domain::{CallSpan, GlobalMetrics, Latency, MetricsSnapshot, ResolverMetric};

/// What one recorded call changed for its key
///
/// Produced under the key's lock and folded into the rollups afterwards;
/// every field is a delta so concurrent updates commute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CallDelta {
    pub latency: Latency,
    pub previous_span: CallSpan,
    pub current_span: CallSpan,
    pub time_saved_ms: Option<f64>,
    pub local_bytes_delta: i64,
}

/// Owner of [`GlobalMetrics`]
///
/// Keeps the running sum of measured call spans so the global mean never
/// needs a pass over every key.
#[derive(Debug, Clone, Default)]
pub(crate) struct GlobalAggregator {
    metrics: GlobalMetrics,
    span_sum_ms: f64,
    measured_spans: u64,
}

impl GlobalAggregator {
    /// Rebuild from a snapshot, recomputing the span accumulators
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        let measured: Vec<f64> = snapshot
            .resolvers
            .iter()
            .filter_map(|metric| metric.average_call_span.as_millis())
            .collect();

        let mut aggregator = Self {
            metrics: snapshot.global.clone(),
            span_sum_ms: measured.iter().sum(),
            measured_spans: measured.len() as u64,
        };
        aggregator.refresh_span_mean();
        aggregator
    }

    pub fn metrics(&self) -> &GlobalMetrics {
        &self.metrics
    }

    /// Fold one call into the rollups
    pub fn apply(&mut self, delta: &CallDelta, unique_resolvers: u64) {
        let global = &mut self.metrics;

        global.total_requests += 1;
        match delta.latency {
            Latency::Cached(ms) => {
                global.cached_count += 1;
                global.total_cached_elapsed_ms += ms;
                global.average_cached_latency_ms =
                    global.total_cached_elapsed_ms / global.cached_count as f64;
            }
            Latency::Uncached(ms) => {
                global.uncached_count += 1;
                global.total_uncached_elapsed_ms += ms;
                global.average_uncached_latency_ms =
                    global.total_uncached_elapsed_ms / global.uncached_count as f64;
            }
        }

        if delta.latency.is_cached() {
            if let Some(saved) = delta.time_saved_ms {
                global.total_time_saved_ms += saved;
            }
        }

        global.unique_resolvers = unique_resolvers;
        global.average_call_count = ratio(global.total_requests as f64, unique_resolvers);
        global.size_of_data_local =
            global.size_of_data_local.saturating_add_signed(delta.local_bytes_delta);
        self.refresh_local_average();

        match (delta.previous_span.as_millis(), delta.current_span.as_millis()) {
            (None, Some(current)) => {
                self.span_sum_ms += current;
                self.measured_spans += 1;
            }
            (Some(previous), Some(current)) => self.span_sum_ms += current - previous,
            _ => {}
        }
        self.refresh_span_mean();
    }

    /// Record a heuristic admission and nudge the adaptive baseline
    pub fn record_heuristic_admission(&mut self, score: f64, baseline: f64) {
        let global = &mut self.metrics;
        global.admitted_count += 1;
        global.average_admission_threshold =
            (baseline + score) / global.total_requests.max(1) as f64;
    }

    pub fn record_frequency_admission(&mut self) {
        self.metrics.admitted_count += 1;
    }

    pub fn record_rejection(&mut self) {
        self.metrics.rejected_count += 1;
    }

    /// Subtract bytes freed by a sweep
    pub fn release_local_bytes(&mut self, freed: u64) {
        self.metrics.size_of_data_local = self.metrics.size_of_data_local.saturating_sub(freed);
        self.refresh_local_average();
    }

    /// Overwrite the observed remote memory usage
    pub fn set_remote_bytes(&mut self, bytes: u64) {
        self.metrics.size_of_data_remote = bytes;
    }

    fn refresh_local_average(&mut self) {
        let global = &mut self.metrics;
        global.average_local_size =
            ratio(global.size_of_data_local as f64, global.unique_resolvers);
    }

    fn refresh_span_mean(&mut self) {
        self.metrics.global_average_call_span_ms =
            (self.measured_spans > 0).then(|| self.span_sum_ms / self.measured_spans as f64);
    }
}

/// `numerator / denominator`, or `0.0` for an empty denominator
fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Build the delta for a metric that was just updated
pub(crate) fn delta_for(
    metric: &ResolverMetric,
    latency: Latency,
    previous_span: CallSpan,
    local_bytes_delta: i64,
) -> CallDelta {
    CallDelta {
        latency,
        previous_span,
        current_span: metric.average_call_span,
        time_saved_ms: metric.time_saved_ms(),
        local_bytes_delta,
    }
}
