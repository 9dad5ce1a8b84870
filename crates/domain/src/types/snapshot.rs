//! Point-in-time export of every tracked metric

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::metrics::{GlobalMetrics, ResolverMetric};
use crate::constants::MAX_RECENT_CALLS;
use crate::errors::{CacheFlowError, CacheFlowResult};

/// Global rollups plus every per-key metric
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub global: GlobalMetrics,
    pub resolvers: Vec<ResolverMetric>,
}

impl MetricsSnapshot {
    /// Look up one key's metric
    pub fn resolver(&self, key: &str) -> Option<&ResolverMetric> {
        self.resolvers.iter().find(|metric| metric.key == key)
    }

    /// Structural checks applied before a snapshot is restored
    ///
    /// # Errors
    /// Returns [`CacheFlowError::MetricsCorruption`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> CacheFlowResult<()> {
        let global = &self.global;

        if global.cached_count + global.uncached_count != global.total_requests {
            return Err(corrupt(format!(
                "cached ({}) + uncached ({}) != total requests ({})",
                global.cached_count, global.uncached_count, global.total_requests
            )));
        }

        if global.unique_resolvers != self.resolvers.len() as u64 {
            return Err(corrupt(format!(
                "unique resolvers ({}) != tracked keys ({})",
                global.unique_resolvers,
                self.resolvers.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.resolvers.len());
        for metric in &self.resolvers {
            if !seen.insert(metric.key.as_str()) {
                return Err(corrupt(format!("duplicate key {}", metric.key)));
            }
            validate_resolver(metric)?;
        }

        Ok(())
    }
}

fn validate_resolver(metric: &ResolverMetric) -> CacheFlowResult<()> {
    if metric.call_count == 0 {
        return Err(corrupt(format!("{}: call count is zero", metric.key)));
    }

    let retained = metric.recent_calls.len();
    if retained == 0 || retained > MAX_RECENT_CALLS {
        return Err(corrupt(format!("{}: {retained} retained call timestamps", metric.key)));
    }

    let ordered =
        metric.recent_calls.iter().zip(metric.recent_calls.iter().skip(1)).all(|(a, b)| a <= b);
    if !ordered {
        return Err(corrupt(format!("{}: call timestamps out of order", metric.key)));
    }

    Ok(())
}

fn corrupt(message: String) -> CacheFlowError {
    CacheFlowError::MetricsCorruption(message)
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::snapshot.
    use super::*;
    use crate::types::StorageLocation;

    fn snapshot_with(metrics: Vec<ResolverMetric>) -> MetricsSnapshot {
        let total: u64 = metrics.iter().map(|m| m.call_count).sum();
        MetricsSnapshot {
            global: GlobalMetrics {
                total_requests: total,
                uncached_count: total,
                unique_resolvers: metrics.len() as u64,
                ..GlobalMetrics::default()
            },
            resolvers: metrics,
        }
    }

    #[test]
    fn test_empty_snapshot_is_valid() {
        assert!(MetricsSnapshot::default().validate().is_ok());
    }

    #[test]
    fn test_consistent_snapshot_is_valid() {
        let mut metric = ResolverMetric::first_call("users", 0, StorageLocation::Local);
        metric.record_call(100);
        let snapshot = snapshot_with(vec![metric]);

        assert!(snapshot.validate().is_ok());
        assert!(snapshot.resolver("users").is_some());
    }

    #[test]
    fn test_rejects_request_count_mismatch() {
        let mut snapshot =
            snapshot_with(vec![ResolverMetric::first_call("a", 0, StorageLocation::Local)]);
        snapshot.global.cached_count = 3;

        assert!(matches!(snapshot.validate(), Err(CacheFlowError::MetricsCorruption(_))));
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let metric = ResolverMetric::first_call("a", 0, StorageLocation::Local);
        let snapshot = snapshot_with(vec![metric.clone(), metric]);

        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate key a"));
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let mut metric = ResolverMetric::first_call("a", 500, StorageLocation::Local);
        metric.recent_calls.push_back(100);
        metric.call_count = 2;

        assert!(snapshot_with(vec![metric]).validate().is_err());
    }

    #[test]
    fn test_rejects_empty_history() {
        let mut metric = ResolverMetric::first_call("a", 0, StorageLocation::Local);
        metric.recent_calls.clear();

        assert!(snapshot_with(vec![metric]).validate().is_err());
    }
}
