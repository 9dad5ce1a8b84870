//! Configuration structures
//!
//! Two layers of configuration exist:
//! - [`EngineConfig`]: process-wide, loaded once at startup (backends,
//!   sweep interval, admission constants)
//! - [`CacheConfig`]: per call site, says which backend to use and for how
//!   long a value stays cached

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_ADMISSION_THRESHOLD, DEFAULT_ADMIT_RATIO, DEFAULT_BASELINE,
    DEFAULT_CHECK_EXPIRE_INTERVAL_SECS, DEFAULT_COLD_SPAN_MS, DEFAULT_COMMAND_TIMEOUT_MS,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MIN_SPAN_MS, DEFAULT_REMOTE_HOST, DEFAULT_REMOTE_PORT,
    DEFAULT_SIZE_SCALE, DEFAULT_SIZE_WEIGHT, DEFAULT_SPAN_SCALE, DEFAULT_SPAN_WEIGHT,
};
use crate::errors::{CacheFlowError, CacheFlowResult};
use crate::types::StorageLocation;

/* -------------------------------------------------------------------------- */
/* Call-site configuration */
/* -------------------------------------------------------------------------- */

/// Per-call cache configuration
///
/// # Examples
/// ```
/// use cacheflow_domain::{CacheConfig, StorageLocation};
///
/// let config = CacheConfig::local(60).with_threshold(2.0);
/// assert_eq!(config.backend, StorageLocation::Local);
/// assert_eq!(config.max_age_ms(), 60_000);
///
/// let mutation = CacheConfig::remote(30).with_mutation("users");
/// assert!(mutation.is_mutation());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(alias = "location")]
    pub backend: StorageLocation,
    /// Seconds a value stays cached; fractions are kept to the millisecond
    #[serde(alias = "maxAge")]
    pub max_age_seconds: f64,
    /// Key to overwrite unconditionally with the computed value
    #[serde(default, alias = "mutate")]
    pub mutate_key: Option<String>,
    /// Per-key frequency threshold in calls per second
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl CacheConfig {
    pub fn local(max_age_seconds: u64) -> Self {
        Self::for_backend(StorageLocation::Local, max_age_seconds)
    }

    pub fn remote(max_age_seconds: u64) -> Self {
        Self::for_backend(StorageLocation::Remote, max_age_seconds)
    }

    fn for_backend(backend: StorageLocation, max_age_seconds: u64) -> Self {
        Self { backend, max_age_seconds: max_age_seconds as f64, mutate_key: None, threshold: None }
    }

    #[must_use]
    pub fn with_mutation(mut self, key: impl Into<String>) -> Self {
        self.mutate_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn is_mutation(&self) -> bool {
        self.mutate_key.is_some()
    }

    /// Max age rounded to whole milliseconds
    pub fn max_age_ms(&self) -> u64 {
        // Float-to-int `as` saturates; validate() rejects NaN and negatives
        (self.max_age_seconds * 1000.0).round() as u64
    }

    /// Parse a dynamically shaped configuration record
    ///
    /// Accepts `backend` or `location` (`"local"`, `"remote"`, `"redis"`),
    /// `maxAge` in seconds (fractions allowed), optional `mutate` and
    /// `threshold`.
    ///
    /// # Errors
    /// Returns [`CacheFlowError::InvalidConfig`] for anything that is not an
    /// object, for missing or mistyped fields, and for values rejected by
    /// [`CacheConfig::validate`].
    pub fn from_json(value: &Value) -> CacheFlowResult<Self> {
        if !value.is_object() {
            return Err(CacheFlowError::InvalidConfig(format!(
                "cache config must be an object, got {}",
                json_kind(value)
            )));
        }

        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| CacheFlowError::InvalidConfig(format!("Invalid cache config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`CacheFlowError::InvalidConfig`] for a max age that is not
    /// finite or rounds below one millisecond, an empty mutation key, or a
    /// negative or non-finite threshold.
    pub fn validate(&self) -> CacheFlowResult<()> {
        if !self.max_age_seconds.is_finite() || self.max_age_ms() == 0 {
            return Err(CacheFlowError::InvalidConfig(format!(
                "maxAge must be at least one millisecond, got {}",
                self.max_age_seconds
            )));
        }
        if self.mutate_key.as_deref().is_some_and(str::is_empty) {
            return Err(CacheFlowError::InvalidConfig("mutate key must not be empty".into()));
        }
        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(CacheFlowError::InvalidConfig(format!(
                    "threshold must be a non-negative number, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/* -------------------------------------------------------------------------- */
/* Engine configuration */
/* -------------------------------------------------------------------------- */

/// Process-wide engine configuration
///
/// Either backend may be absent. Without `local` no sweeper runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub local: Option<LocalConfig>,
    pub remote: Option<RemoteConfig>,
    pub admission: AdmissionTuning,
}

impl EngineConfig {
    /// Admission constants with the local default threshold applied
    pub fn effective_tuning(&self) -> AdmissionTuning {
        let mut tuning = self.admission.clone();
        if let Some(threshold) = self.local.as_ref().and_then(|local| local.admission_threshold) {
            tuning.default_threshold = threshold;
        }
        tuning
    }

    /// # Errors
    /// Returns [`CacheFlowError::InvalidConfig`] when any section is invalid.
    pub fn validate(&self) -> CacheFlowResult<()> {
        if let Some(local) = &self.local {
            local.validate()?;
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        self.effective_tuning().validate()
    }
}

/// Local store and sweeper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    #[serde(alias = "checkExpireIntervalSeconds", alias = "checkExpire")]
    pub check_expire_interval_seconds: u64,
    /// Default frequency threshold in calls per second
    #[serde(
        alias = "defaultAdmissionThreshold",
        alias = "defaultAdmissionThresholdMillis",
        alias = "globalThreshold"
    )]
    pub admission_threshold: Option<f64>,
    /// Mirror the local store to this JSON file
    #[serde(alias = "persistPath")]
    pub persist_path: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            check_expire_interval_seconds: DEFAULT_CHECK_EXPIRE_INTERVAL_SECS,
            admission_threshold: None,
            persist_path: None,
        }
    }
}

impl LocalConfig {
    fn validate(&self) -> CacheFlowResult<()> {
        if self.check_expire_interval_seconds == 0 {
            return Err(CacheFlowError::InvalidConfig(
                "check_expire_interval_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Remote store connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Full connection URL; takes precedence over host/port/password
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    #[serde(alias = "connectTimeoutMs")]
    pub connect_timeout_ms: u64,
    #[serde(alias = "commandTimeoutMs")]
    pub command_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_REMOTE_HOST.to_string(),
            port: DEFAULT_REMOTE_PORT,
            password: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!("redis://:{password}@{}:{}/", self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }

    fn validate(&self) -> CacheFlowResult<()> {
        if self.url.is_none() && self.host.is_empty() {
            return Err(CacheFlowError::InvalidConfig("remote needs a url or a host".into()));
        }
        if self.command_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(CacheFlowError::InvalidConfig(
                "remote timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Admission heuristic constants
///
/// The score for a key with prior history is
/// `callDeviation + span_weight / (span_scale * span) + size_weight * sizeDeviation`
/// where `sizeDeviation = (size - averageLocalSize) / size_scale`, and the
/// key is admitted when the score exceeds `admit_ratio * baseline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionTuning {
    /// Calls per second at or above which a key is admitted outright
    #[serde(alias = "defaultThreshold")]
    pub default_threshold: f64,
    pub span_weight: f64,
    pub span_scale: f64,
    pub size_weight: f64,
    pub size_scale: f64,
    pub admit_ratio: f64,
    pub baseline: f64,
    /// Span assumed for keys without a measured span
    pub cold_span_ms: f64,
    /// Floor applied to non-positive spans
    pub min_span_ms: f64,
}

impl Default for AdmissionTuning {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_ADMISSION_THRESHOLD,
            span_weight: DEFAULT_SPAN_WEIGHT,
            span_scale: DEFAULT_SPAN_SCALE,
            size_weight: DEFAULT_SIZE_WEIGHT,
            size_scale: DEFAULT_SIZE_SCALE,
            admit_ratio: DEFAULT_ADMIT_RATIO,
            baseline: DEFAULT_BASELINE,
            cold_span_ms: DEFAULT_COLD_SPAN_MS,
            min_span_ms: DEFAULT_MIN_SPAN_MS,
        }
    }
}

impl AdmissionTuning {
    /// # Errors
    /// Returns [`CacheFlowError::InvalidConfig`] for non-finite values, for
    /// non-positive scales and spans, and for a negative threshold.
    pub fn validate(&self) -> CacheFlowResult<()> {
        let all = [
            ("default_threshold", self.default_threshold),
            ("span_weight", self.span_weight),
            ("span_scale", self.span_scale),
            ("size_weight", self.size_weight),
            ("size_scale", self.size_scale),
            ("admit_ratio", self.admit_ratio),
            ("baseline", self.baseline),
            ("cold_span_ms", self.cold_span_ms),
            ("min_span_ms", self.min_span_ms),
        ];
        if let Some((name, value)) = all.iter().find(|(_, value)| !value.is_finite()) {
            return Err(CacheFlowError::InvalidConfig(format!(
                "{name} must be finite, got {value}"
            )));
        }

        let positive = [
            ("span_scale", self.span_scale),
            ("size_scale", self.size_scale),
            ("cold_span_ms", self.cold_span_ms),
            ("min_span_ms", self.min_span_ms),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| *value <= 0.0) {
            return Err(CacheFlowError::InvalidConfig(format!(
                "{name} must be positive, got {value}"
            )));
        }

        if self.default_threshold < 0.0 {
            return Err(CacheFlowError::InvalidConfig(
                "default_threshold must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for config.
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json_accepts_location_alias() {
        let raw = json!({ "location": "redis", "maxAge": 30, "mutate": "users" });
        let config = CacheConfig::from_json(&raw).unwrap();
        assert_eq!(config.backend, StorageLocation::Remote);
        assert_eq!(config.max_age_seconds, 30.0);
        assert_eq!(config.mutate_key.as_deref(), Some("users"));
        assert_eq!(config.threshold, None);
    }

    #[test]
    fn test_from_json_rejects_array() {
        let err = CacheConfig::from_json(&json!([{ "location": "local" }])).unwrap_err();
        assert!(matches!(err, CacheFlowError::InvalidConfig(msg) if msg.contains("array")));
    }

    #[test]
    fn test_from_json_rejects_scalars_and_null() {
        for value in [json!(null), json!(42), json!("local"), json!(true)] {
            let result = CacheConfig::from_json(&value);
            assert!(matches!(result, Err(CacheFlowError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_from_json_rejects_wrong_field_types() {
        let cases = [
            json!({ "location": "local", "maxAge": "sixty" }),
            json!({ "location": "disk", "maxAge": 60 }),
            json!({ "location": "local", "maxAge": 60, "threshold": "high" }),
            json!({ "location": "local", "maxAge": -1 }),
            json!({ "maxAge": 60 }),
        ];
        for case in cases {
            assert!(
                matches!(CacheConfig::from_json(&case), Err(CacheFlowError::InvalidConfig(_))),
                "expected InvalidConfig for {case}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_zero_max_age() {
        assert!(CacheConfig::local(0).validate().is_err());
        assert!(CacheConfig::local(1).validate().is_ok());

        let config = CacheConfig { max_age_seconds: 0.0004, ..CacheConfig::local(1) };
        assert!(config.validate().is_err());
        let config = CacheConfig { max_age_seconds: f64::INFINITY, ..CacheConfig::local(1) };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_accepts_fractional_max_age() {
        let config =
            CacheConfig::from_json(&json!({ "location": "local", "maxAge": 1.5 })).unwrap();
        assert_eq!(config.max_age_ms(), 1_500);

        let config =
            CacheConfig::from_json(&json!({ "location": "local", "maxAge": 0.25 })).unwrap();
        assert_eq!(config.max_age_ms(), 250);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        assert!(CacheConfig::local(10).with_threshold(f64::NAN).validate().is_err());
        assert!(CacheConfig::local(10).with_threshold(-1.0).validate().is_err());
        assert!(CacheConfig::local(10).with_threshold(0.0).validate().is_ok());
    }

    #[test]
    fn test_engine_config_defaults_from_empty_toml_sections() {
        let config: EngineConfig = serde_json::from_value(json!({ "local": {} })).unwrap();
        let local = config.local.as_ref().unwrap();

        assert_eq!(local.check_expire_interval_seconds, DEFAULT_CHECK_EXPIRE_INTERVAL_SECS);
        assert!(config.remote.is_none());
        assert_eq!(config.admission, AdmissionTuning::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_tuning_applies_local_threshold() {
        let config: EngineConfig = serde_json::from_value(json!({
            "local": { "checkExpireIntervalSeconds": 5, "defaultAdmissionThreshold": 4.0 }
        }))
        .unwrap();

        assert_eq!(config.local.as_ref().unwrap().check_expire_interval_seconds, 5);
        assert_eq!(config.effective_tuning().default_threshold, 4.0);
    }

    #[test]
    fn test_local_threshold_accepts_millis_key() {
        let config: EngineConfig = serde_json::from_value(json!({
            "local": { "defaultAdmissionThresholdMillis": 2.5 }
        }))
        .unwrap();

        assert_eq!(config.local.as_ref().unwrap().admission_threshold, Some(2.5));
        assert_eq!(config.effective_tuning().default_threshold, 2.5);
    }

    #[test]
    fn test_tuning_rejects_non_positive_scale() {
        let tuning = AdmissionTuning { span_scale: 0.0, ..AdmissionTuning::default() };
        assert!(tuning.validate().is_err());

        let tuning = AdmissionTuning { size_weight: f64::INFINITY, ..AdmissionTuning::default() };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_remote_connection_url() {
        let remote = RemoteConfig { password: Some("secret".into()), ..RemoteConfig::default() };
        assert_eq!(remote.connection_url(), "redis://:secret@127.0.0.1:6379/");

        let remote =
            RemoteConfig { url: Some("redis://cache:6380/2".into()), ..RemoteConfig::default() };
        assert_eq!(remote.connection_url(), "redis://cache:6380/2");
    }
}
