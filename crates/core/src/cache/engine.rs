//! Cache orchestrator
//!
//! Routes each call to the configured backend, runs the caller's
//! computation on a miss, consults the admission policy and records
//! metrics. No lock on metrics or backends is held while the computation
//! runs.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use cacheflow_common::time::{Clock, SystemClock};
use cacheflow_domain::{
    estimate_size, AdmissionTuning, CacheConfig, CacheEntry, CacheFlowError, CacheFlowResult,
    GlobalMetrics, MetricsSnapshot, ResolverMetric, StorageLocation,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::ports::{LocalStore, RemoteStore};
use crate::admission::AdmissionPolicy;
use crate::metrics::{CallSample, MetricsRepository};

/// Adaptive cache in front of expensive computations
pub struct CacheEngine<C: Clock = SystemClock> {
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    metrics: Arc<MetricsRepository>,
    policy: AdmissionPolicy,
    clock: C,
}

impl CacheEngine<SystemClock> {
    /// Create an engine without backends, driven by the system clock
    pub fn new(tuning: AdmissionTuning) -> Self {
        Self::with_clock(tuning, SystemClock)
    }
}

impl<C: Clock> CacheEngine<C> {
    /// Create an engine with a custom clock (useful for testing)
    pub fn with_clock(tuning: AdmissionTuning, clock: C) -> Self {
        Self {
            local: None,
            remote: None,
            metrics: Arc::new(MetricsRepository::new()),
            policy: AdmissionPolicy::new(tuning),
            clock,
        }
    }

    pub fn with_local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local = Some(store);
        self
    }

    pub fn with_remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(store);
        self
    }

    /// Share an existing metrics repository
    pub fn with_metrics(mut self, metrics: Arc<MetricsRepository>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<MetricsRepository> {
        Arc::clone(&self.metrics)
    }

    pub fn local_store(&self) -> Option<Arc<dyn LocalStore>> {
        self.local.clone()
    }

    pub fn remote_store(&self) -> Option<Arc<dyn RemoteStore>> {
        self.remote.clone()
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Return the cached value for `key`, or compute it
    ///
    /// `compute` runs at most once: on a miss, or always for a mutation
    /// (`config.mutate_key`), in which case the result is written to the
    /// mutation key without consulting the admission policy.
    ///
    /// # Errors
    /// - `InvalidConfig` for an invalid config or an unconfigured backend,
    ///   before any I/O
    /// - `KeyNotFoundForMutation` when the mutation key was never observed
    /// - `BackendUnavailable` when the lookup fails
    /// - `Compute` when `compute` fails
    /// - `MetricsCorruption` when a cached value cannot be decoded as `T`;
    ///   the hit is still recorded
    ///
    /// A computed value that does not serialize is returned uncached.
    #[instrument(skip(self, config, compute), fields(backend = %config.backend))]
    pub async fn cache<T, F, Fut, E>(
        &self,
        config: &CacheConfig,
        key: &str,
        compute: F,
    ) -> CacheFlowResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        config.validate()?;
        let backend = self.backend(config.backend)?;

        if let Some(target) = config.mutate_key.as_deref() {
            return self.mutate(config, &backend, target, compute).await;
        }

        let start = self.clock.now();
        let hit = match &backend {
            Backend::Local(store) => store.get(key).await?.map(|entry| entry.data),
            Backend::Remote(store) => store.get(key).await?,
        };

        match hit {
            Some(data) => self.serve_hit(config, &backend, key, data, start).await,
            None => self.serve_miss(config, &backend, key, compute, start).await,
        }
    }

    async fn serve_hit<T: DeserializeOwned>(
        &self,
        config: &CacheConfig,
        backend: &Backend,
        key: &str,
        data: Value,
        start: std::time::Instant,
    ) -> CacheFlowResult<T> {
        let now_ms = self.clock.millis_since_epoch();
        let deadline_ms = now_ms.saturating_add(config.max_age_ms());
        let refreshed = match backend {
            Backend::Local(store) => store.touch(key, deadline_ms).await,
            Backend::Remote(store) => store.expire(key, config.max_age_ms()).await,
        };
        if let Err(err) = refreshed {
            warn!(key, error = %err, "Failed to refresh cached entry expiration");
        }

        let decoded = serde_json::from_value(data);

        let latency_ms = self.elapsed_ms(start);
        self.metrics.record_call(key, CallSample::cached(latency_ms, config.backend), now_ms);

        let value = decoded.map_err(|e| {
            CacheFlowError::MetricsCorruption(format!(
                "cached value for {key} does not decode: {e}"
            ))
        })?;
        debug!(key, latency_ms, "Cache hit");
        Ok(value)
    }

    async fn serve_miss<T, F, Fut, E>(
        &self,
        config: &CacheConfig,
        backend: &Backend,
        key: &str,
        compute: F,
        start: std::time::Instant,
    ) -> CacheFlowResult<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let value = compute().await.map_err(|e| CacheFlowError::Compute(e.to_string()))?;
        let latency_ms = self.elapsed_ms(start);
        let now_ms = self.clock.millis_since_epoch();

        let sample = CallSample::uncached(latency_ms, config.backend);
        let data = match serde_json::to_value(&value) {
            Ok(data) => data,
            Err(err) => {
                warn!(key, error = %err, "Computed value does not serialize; not cached");
                self.metrics.record_call(key, sample, now_ms);
                return Ok(value);
            }
        };
        let sample = sample.with_size(estimate_size(&data));
        let recorded = self.metrics.record_call(key, sample, now_ms);

        let global = self.metrics.global();
        let has_history = !recorded.first_call;
        let decision =
            self.policy.evaluate(&recorded.metric, &global, config.threshold, has_history);
        if decision.is_admitted() {
            self.write(config, backend, key, data, now_ms).await;
        }
        self.metrics.record_admission(key, &decision, self.policy.tuning().baseline);

        debug!(key, latency_ms, ?decision, "Cache miss");
        Ok(value)
    }

    async fn mutate<T, F, Fut, E>(
        &self,
        config: &CacheConfig,
        backend: &Backend,
        target: &str,
        compute: F,
    ) -> CacheFlowResult<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if !self.metrics.contains(target) {
            return Err(CacheFlowError::KeyNotFoundForMutation(target.to_string()));
        }

        let start = self.clock.now();
        let value = compute().await.map_err(|e| CacheFlowError::Compute(e.to_string()))?;
        let latency_ms = self.elapsed_ms(start);
        let now_ms = self.clock.millis_since_epoch();

        let sample = CallSample::uncached(latency_ms, config.backend).as_mutation();
        let data = match serde_json::to_value(&value) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    key = target,
                    error = %err,
                    "Mutation result does not serialize; not written"
                );
                self.metrics.record_call(target, sample, now_ms);
                return Ok(value);
            }
        };
        let size = estimate_size(&data);
        self.write(config, backend, target, data, now_ms).await;
        self.metrics.record_call(target, sample.with_size(size), now_ms);

        debug!(key = target, size, "Mutation written");
        Ok(value)
    }

    /// Persist an entry; failures are logged, never returned
    async fn write(
        &self,
        config: &CacheConfig,
        backend: &Backend,
        key: &str,
        data: Value,
        now_ms: u64,
    ) {
        let written = match backend {
            Backend::Local(store) => {
                let entry = CacheEntry::new(key, data, now_ms.saturating_add(config.max_age_ms()));
                store.set(entry).await
            }
            Backend::Remote(store) => store.set(key, &data, config.max_age_ms()).await,
        };

        if let Err(err) = written {
            warn!(key, error = %err, "Failed to write cache entry");
        }
    }

    fn backend(&self, location: StorageLocation) -> CacheFlowResult<Backend> {
        let backend = match location {
            StorageLocation::Local => self.local.clone().map(Backend::Local),
            StorageLocation::Remote => self.remote.clone().map(Backend::Remote),
        };
        backend.ok_or_else(|| {
            CacheFlowError::InvalidConfig(format!("{location} backend is not configured"))
        })
    }

    fn elapsed_ms(&self, start: std::time::Instant) -> f64 {
        self.clock.now().saturating_duration_since(start).as_secs_f64() * 1000.0
    }

    /// Every tracked metric plus the global rollups
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Replace all metrics with a previously exported snapshot
    ///
    /// # Errors
    /// Returns `MetricsCorruption` when the snapshot fails validation.
    pub fn restore(&self, snapshot: MetricsSnapshot) -> CacheFlowResult<()> {
        self.metrics.restore(snapshot)
    }

    pub fn resolver_metric(&self, key: &str) -> Option<ResolverMetric> {
        self.metrics.resolver(key)
    }

    pub fn global_metrics(&self) -> GlobalMetrics {
        self.metrics.global()
    }
}

enum Backend {
    Local(Arc<dyn LocalStore>),
    Remote(Arc<dyn RemoteStore>),
}
