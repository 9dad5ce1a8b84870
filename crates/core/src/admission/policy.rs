//! Admission policy: decide whether a freshly computed value is cached
//!
//! Two stages run in order:
//! 1. **Frequency gate**: calls per second over the retained history,
//!    compared with the per-key threshold or the configured default. A pass
//!    admits without scoring.
//! 2. **Heuristic score**: only for keys with prior history. Combines how
//!    often the key is called relative to the average key, how hot it is
//!    and how large its payload is relative to the average local payload.

use cacheflow_domain::{AdmissionTuning, GlobalMetrics, ResolverMetric};

/// Outcome of one admission evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmissionDecision {
    /// Frequency reached the threshold; no score computed
    Frequency { frequency: f64 },
    /// Admitted by the heuristic score
    Heuristic { score: f64 },
    /// Not cached; `score` is `None` when the heuristic was skipped
    Rejected { frequency: f64, score: Option<f64> },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Pure admission logic over a key's metric and the global rollups
#[derive(Debug, Clone, Default)]
pub struct AdmissionPolicy {
    tuning: AdmissionTuning,
}

impl AdmissionPolicy {
    pub fn new(tuning: AdmissionTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &AdmissionTuning {
        &self.tuning
    }

    /// Evaluate a key on the miss path
    ///
    /// `has_history` is `false` for the key's very first call, in which case
    /// only the frequency gate runs.
    pub fn evaluate(
        &self,
        metric: &ResolverMetric,
        global: &GlobalMetrics,
        threshold_override: Option<f64>,
        has_history: bool,
    ) -> AdmissionDecision {
        let threshold = threshold_override.unwrap_or(self.tuning.default_threshold);
        let frequency = metric.frequency();

        if frequency >= threshold {
            return AdmissionDecision::Frequency { frequency };
        }
        if !has_history {
            return AdmissionDecision::Rejected { frequency, score: None };
        }

        let score = self.score(metric, global);
        if score > self.tuning.admit_ratio * self.tuning.baseline {
            AdmissionDecision::Heuristic { score }
        } else {
            AdmissionDecision::Rejected { frequency, score: Some(score) }
        }
    }

    /// Heuristic score for a key
    ///
    /// Divisions by the global averages contribute zero when the average is
    /// zero.
    pub fn score(&self, metric: &ResolverMetric, global: &GlobalMetrics) -> f64 {
        let tuning = &self.tuning;

        let call_deviation = if global.average_call_count > 0.0 {
            (metric.call_count as f64 - global.average_call_count) / global.average_call_count
        } else {
            0.0
        };

        let mut span = metric.average_call_span.as_millis().unwrap_or(tuning.cold_span_ms);
        if span <= 0.0 {
            span = tuning.min_span_ms;
        }
        let recency = tuning.span_weight / (tuning.span_scale * span);

        let size_deviation =
            (metric.data_size_bytes as f64 - global.average_local_size) / tuning.size_scale;

        call_deviation + recency + tuning.size_weight * size_deviation
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for admission::policy.
    use cacheflow_domain::{CallSpan, StorageLocation};

    use super::*;

    fn metric_with_calls(timestamps: &[u64]) -> ResolverMetric {
        let mut metric = ResolverMetric::first_call("users", timestamps[0], StorageLocation::Local);
        for t in &timestamps[1..] {
            metric.record_call(*t);
        }
        metric
    }

    #[test]
    fn test_first_call_never_scored() {
        let policy = AdmissionPolicy::default();
        let metric = metric_with_calls(&[0]);
        // A huge payload would score high if the heuristic ran.
        let metric = ResolverMetric { data_size_bytes: 1_000_000, ..metric };

        let decision = policy.evaluate(&metric, &GlobalMetrics::default(), None, false);
        assert_eq!(decision, AdmissionDecision::Rejected { frequency: 0.0, score: None });
    }

    #[test]
    fn test_zero_threshold_override_admits_first_call() {
        let policy = AdmissionPolicy::default();
        let metric = metric_with_calls(&[0]);

        let decision = policy.evaluate(&metric, &GlobalMetrics::default(), Some(0.0), false);
        assert!(matches!(decision, AdmissionDecision::Frequency { .. }));
    }

    #[test]
    fn test_frequency_gate_bypasses_score() {
        let policy = AdmissionPolicy::default();
        let metric = metric_with_calls(&[0, 500, 1_000, 1_500, 2_000]);
        // Average call count far above this key makes the score strongly negative.
        let global = GlobalMetrics { average_call_count: 1_000.0, ..GlobalMetrics::default() };

        assert!(policy.score(&metric, &global) < 0.0);
        let decision = policy.evaluate(&metric, &global, None, true);
        assert_eq!(decision, AdmissionDecision::Frequency { frequency: 2.5 });
    }

    #[test]
    fn test_per_key_threshold_overrides_default() {
        let policy = AdmissionPolicy::default();
        let metric = metric_with_calls(&[0, 500, 1_000, 1_500, 2_000]);
        let global = GlobalMetrics { average_call_count: 1_000.0, ..GlobalMetrics::default() };

        let decision = policy.evaluate(&metric, &global, Some(10.0), true);
        assert!(!decision.is_admitted());
    }

    #[test]
    fn test_score_formula() {
        let policy = AdmissionPolicy::default();
        let metric = ResolverMetric {
            call_count: 4,
            average_call_span: CallSpan::Measured(500.0),
            data_size_bytes: 400,
            ..metric_with_calls(&[0])
        };
        let global = GlobalMetrics {
            average_call_count: 2.0,
            average_local_size: 100.0,
            ..GlobalMetrics::default()
        };

        // (4 - 2) / 2 + 0.92 / (0.004 * 500) + 0.17 * (400 - 100) / 300
        let expected = 1.0 + 0.46 + 0.17;
        assert!((policy.score(&metric, &global) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_admits_large_hot_key() {
        let policy = AdmissionPolicy::default();
        let metric = ResolverMetric { data_size_bytes: 3_000, ..metric_with_calls(&[0, 60_000]) };
        let global = GlobalMetrics {
            average_call_count: 2.0,
            average_local_size: 100.0,
            ..GlobalMetrics::default()
        };

        let decision = policy.evaluate(&metric, &global, None, true);
        assert!(matches!(decision, AdmissionDecision::Heuristic { score } if score > 0.97));
    }

    #[test]
    fn test_heuristic_rejects_cold_small_key() {
        let policy = AdmissionPolicy::default();
        let metric = ResolverMetric { data_size_bytes: 10, ..metric_with_calls(&[0, 60_000]) };
        let global = GlobalMetrics {
            average_call_count: 2.0,
            average_local_size: 10.0,
            ..GlobalMetrics::default()
        };

        let decision = policy.evaluate(&metric, &global, None, true);
        assert!(matches!(decision, AdmissionDecision::Rejected { score: Some(_), .. }));
    }

    #[test]
    fn test_zero_averages_are_guarded() {
        let policy = AdmissionPolicy::default();
        let metric = ResolverMetric {
            average_call_span: CallSpan::InsufficientData,
            ..metric_with_calls(&[0])
        };

        let score = policy.score(&metric, &GlobalMetrics::default());
        assert!(score.is_finite());
        // Cold span: 0.92 / (0.004 * 10_000)
        assert!((score - 0.023).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_span_uses_floor() {
        let policy = AdmissionPolicy::default();
        let metric = ResolverMetric {
            average_call_span: CallSpan::Measured(0.0),
            ..metric_with_calls(&[0])
        };

        let score = policy.score(&metric, &GlobalMetrics::default());
        assert!((score - 230.0).abs() < 1e-9);
    }
}
