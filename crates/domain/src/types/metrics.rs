//! Per-key call statistics and process-wide rollups

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::entry::StorageLocation;
use crate::constants::MAX_RECENT_CALLS;

/// Average time between a key's retained calls
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallSpan {
    /// Fewer than two calls observed
    #[default]
    InsufficientData,
    /// Milliseconds
    Measured(f64),
}

impl CallSpan {
    pub fn as_millis(&self) -> Option<f64> {
        match self {
            Self::InsufficientData => None,
            Self::Measured(ms) => Some(*ms),
        }
    }
}

/// One latency observation, exactly one of cached or uncached
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Latency {
    /// Served from a backend
    Cached(f64),
    /// Produced by running the computation
    Uncached(f64),
}

impl Latency {
    pub fn millis(&self) -> f64 {
        match self {
            Self::Cached(ms) | Self::Uncached(ms) => *ms,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Call history and sizing for one cache key
///
/// Created on the first observed call and kept for the life of the
/// process. When the key's local entry expires only `data_size_bytes` is
/// zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverMetric {
    pub key: String,
    pub first_call_at_ms: u64,
    /// Oldest first, at most [`MAX_RECENT_CALLS`] entries
    #[serde(rename = "recentCallTimestamps")]
    pub recent_calls: VecDeque<u64>,
    pub call_count: u64,
    pub average_call_span: CallSpan,
    pub last_uncached_latency_ms: Option<f64>,
    pub last_cached_latency_ms: Option<f64>,
    pub data_size_bytes: u64,
    pub storage_location: StorageLocation,
    pub admission_score: Option<f64>,
}

impl ResolverMetric {
    /// Metric for a key's very first call
    pub fn first_call(key: impl Into<String>, now_ms: u64, location: StorageLocation) -> Self {
        let mut recent_calls = VecDeque::with_capacity(MAX_RECENT_CALLS + 1);
        recent_calls.push_back(now_ms);

        Self {
            key: key.into(),
            first_call_at_ms: now_ms,
            recent_calls,
            call_count: 1,
            average_call_span: CallSpan::InsufficientData,
            last_uncached_latency_ms: None,
            last_cached_latency_ms: None,
            data_size_bytes: 0,
            storage_location: location,
            admission_score: None,
        }
    }

    /// Append a call timestamp and recompute the call span
    ///
    /// Timestamps older than the newest retained one are clamped to it, so
    /// concurrent callers cannot reorder the history.
    pub fn record_call(&mut self, now_ms: u64) {
        let now_ms = self.recent_calls.back().map_or(now_ms, |last| now_ms.max(*last));
        self.recent_calls.push_back(now_ms);
        while self.recent_calls.len() > MAX_RECENT_CALLS {
            self.recent_calls.pop_front();
        }

        let oldest = self.recent_calls.front().copied().unwrap_or(now_ms);
        let span = now_ms.saturating_sub(oldest) as f64 / self.recent_calls.len() as f64;
        self.average_call_span = CallSpan::Measured(span);
        self.call_count += 1;
    }

    /// Overwrite the latency matching the sample's kind; the other is kept
    pub fn record_latency(&mut self, latency: Latency) {
        match latency {
            Latency::Cached(ms) => self.last_cached_latency_ms = Some(ms),
            Latency::Uncached(ms) => self.last_uncached_latency_ms = Some(ms),
        }
    }

    /// Calls per second over the retained window
    ///
    /// `0.0` with fewer than two timestamps, `f64::INFINITY` when all of
    /// them share the same millisecond.
    pub fn frequency(&self) -> f64 {
        let (Some(first), Some(last)) = (self.recent_calls.front(), self.recent_calls.back()) else {
            return 0.0;
        };
        if self.recent_calls.len() < 2 {
            return 0.0;
        }

        let elapsed_secs = last.saturating_sub(*first) as f64 / 1000.0;
        if elapsed_secs == 0.0 {
            return f64::INFINITY;
        }
        self.call_count as f64 / elapsed_secs
    }

    /// Uncached minus cached latency, once both have been observed
    pub fn time_saved_ms(&self) -> Option<f64> {
        Some(self.last_uncached_latency_ms? - self.last_cached_latency_ms?)
    }
}

/// Process-wide totals and derived averages
///
/// `cached_count + uncached_count == total_requests` and
/// `unique_resolvers` equals the number of tracked keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalMetrics {
    pub total_requests: u64,
    pub cached_count: u64,
    pub uncached_count: u64,
    pub total_time_saved_ms: f64,
    pub total_cached_elapsed_ms: f64,
    pub total_uncached_elapsed_ms: f64,
    pub average_cached_latency_ms: f64,
    pub average_uncached_latency_ms: f64,
    pub average_call_count: f64,
    /// Mean of measured call spans; `None` until some key has two calls
    pub global_average_call_span_ms: Option<f64>,
    pub unique_resolvers: u64,
    pub size_of_data_local: u64,
    pub size_of_data_remote: u64,
    pub average_local_size: f64,
    pub average_admission_threshold: f64,
    pub admitted_count: u64,
    pub rejected_count: u64,
}
