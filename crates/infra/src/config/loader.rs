//! Configuration loader
//!
//! Loads [`EngineConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If none are set, falls back to loading from file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS`: Sweep interval in seconds
//! - `CACHEFLOW_LOCAL_THRESHOLD`: Default admission threshold (calls/s)
//! - `CACHEFLOW_LOCAL_PERSIST_PATH`: JSON document for the local store
//! - `CACHEFLOW_REMOTE_URL`: Remote store connection URL
//! - `CACHEFLOW_REMOTE_COMMAND_TIMEOUT_MS`: Remote command timeout
//!
//! Any `CACHEFLOW_LOCAL_*` variable enables the local backend and
//! `CACHEFLOW_REMOTE_URL` enables the remote one.
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./cacheflow.toml` or `./cacheflow.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names in the parent and grandparent directories
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use cacheflow_domain::{CacheFlowError, CacheFlowResult, EngineConfig, LocalConfig, RemoteConfig};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["cacheflow.toml", "cacheflow.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If none are set,
/// falls back to loading from a config file.
///
/// # Errors
/// Returns `CacheFlowError::InvalidConfig` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> CacheFlowResult<EngineConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CacheFlowError::InvalidConfig` if no `CACHEFLOW_*` variable is
/// set or a value does not parse.
pub fn load_from_env() -> CacheFlowResult<EngineConfig> {
    let check_expire = env_parse::<u64>("CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS")?;
    let threshold = env_parse::<f64>("CACHEFLOW_LOCAL_THRESHOLD")?;
    let persist_path = std::env::var("CACHEFLOW_LOCAL_PERSIST_PATH").ok().map(PathBuf::from);
    let remote_url = std::env::var("CACHEFLOW_REMOTE_URL").ok();
    let command_timeout = env_parse::<u64>("CACHEFLOW_REMOTE_COMMAND_TIMEOUT_MS")?;

    let any_local = check_expire.is_some() || threshold.is_some() || persist_path.is_some();
    let local = any_local.then(|| {
        let defaults = LocalConfig::default();
        LocalConfig {
            check_expire_interval_seconds: check_expire
                .unwrap_or(defaults.check_expire_interval_seconds),
            admission_threshold: threshold,
            persist_path,
        }
    });

    let remote = remote_url.map(|url| {
        let defaults = RemoteConfig::default();
        RemoteConfig {
            url: Some(url),
            command_timeout_ms: command_timeout.unwrap_or(defaults.command_timeout_ms),
            ..defaults
        }
    });

    if local.is_none() && remote.is_none() {
        return Err(CacheFlowError::InvalidConfig(
            "No CACHEFLOW_LOCAL_* or CACHEFLOW_REMOTE_URL environment variable set".to_string(),
        ));
    }

    let config = EngineConfig { local, remote, ..EngineConfig::default() };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CacheFlowError::InvalidConfig` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> CacheFlowResult<EngineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CacheFlowError::InvalidConfig(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            CacheFlowError::InvalidConfig(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CacheFlowError::InvalidConfig(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> CacheFlowResult<EngineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CacheFlowError::InvalidConfig(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CacheFlowError::InvalidConfig(format!("Invalid JSON format: {e}"))),
        _ => Err(CacheFlowError::InvalidConfig(format!("Unsupported config format: {extension}"))),
    }
}

/// Search multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    let mut bases = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        bases.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            bases.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    bases
        .iter()
        .flat_map(|base| CONFIG_FILE_NAMES.iter().map(move |name| base.join(name)))
        .find(|path| path.exists())
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `CacheFlowError::InvalidConfig` if the variable is set but does
/// not parse as `T`.
fn env_parse<T>(key: &str) -> CacheFlowResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CacheFlowError::InvalidConfig(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 5] = [
        "CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS",
        "CACHEFLOW_LOCAL_THRESHOLD",
        "CACHEFLOW_LOCAL_PERSIST_PATH",
        "CACHEFLOW_REMOTE_URL",
        "CACHEFLOW_REMOTE_COMMAND_TIMEOUT_MS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_env_local_and_remote() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        std::env::set_var("CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS", "30");
        std::env::set_var("CACHEFLOW_LOCAL_THRESHOLD", "2.5");
        std::env::set_var("CACHEFLOW_REMOTE_URL", "redis://cache.internal:6380/");
        std::env::set_var("CACHEFLOW_REMOTE_COMMAND_TIMEOUT_MS", "250");

        let result = load_from_env();
        clear_env();

        let config = result.unwrap();
        let local = config.local.unwrap();
        assert_eq!(local.check_expire_interval_seconds, 30);
        assert_eq!(local.admission_threshold, Some(2.5));
        assert!(local.persist_path.is_none());

        let remote = config.remote.unwrap();
        assert_eq!(remote.connection_url(), "redis://cache.internal:6380/");
        assert_eq!(remote.command_timeout_ms, 250);
    }

    #[test]
    fn test_load_from_env_persist_path_alone_enables_local() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        std::env::set_var("CACHEFLOW_LOCAL_PERSIST_PATH", "/var/lib/cacheflow/cache.json");
        let result = load_from_env();
        clear_env();

        let config = result.unwrap();
        let local = config.local.unwrap();
        assert_eq!(local.check_expire_interval_seconds, 10);
        assert_eq!(local.persist_path, Some(PathBuf::from("/var/lib/cacheflow/cache.json")));
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_load_from_env_nothing_set() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        assert!(matches!(load_from_env(), Err(CacheFlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        std::env::set_var("CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS", "soon");
        let result = load_from_env();
        clear_env();

        let Err(CacheFlowError::InvalidConfig(msg)) = result else {
            panic!("expected InvalidConfig");
        };
        assert!(msg.contains("CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS"));
    }

    #[test]
    fn test_load_from_env_zero_interval_fails_validation() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_env();

        std::env::set_var("CACHEFLOW_LOCAL_CHECK_EXPIRE_SECS", "0");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(CacheFlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cacheflow.toml");
        std::fs::write(
            &path,
            r#"
[local]
check_expire_interval_seconds = 5
admission_threshold = 0.5

[remote]
host = "10.0.0.7"
port = 6390

[admission]
size_weight = 0.2
"#,
        )
        .unwrap();

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.local.as_ref().unwrap().check_expire_interval_seconds, 5);
        assert_eq!(config.remote.as_ref().unwrap().connection_url(), "redis://10.0.0.7:6390/");
        assert!((config.admission.size_weight - 0.2).abs() < f64::EPSILON);
        assert!((config.admission.span_weight - 0.92).abs() < f64::EPSILON);
        assert!((config.effective_tuning().default_threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_file_json_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cacheflow.json");
        let contents = r#"{
            "local": { "checkExpireIntervalSeconds": 20, "defaultAdmissionThreshold": 3 }
        }"#;
        std::fs::write(&path, contents).unwrap();

        let config = load_from_file(Some(path)).unwrap();
        let local = config.local.unwrap();
        assert_eq!(local.check_expire_interval_seconds, 20);
        assert_eq!(local.admission_threshold, Some(3.0));
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/cacheflow.toml")));
        assert!(matches!(result, Err(CacheFlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cacheflow.json");
        std::fs::write(&path, r#"{ "local": "#).unwrap();

        assert!(matches!(load_from_file(Some(path)), Err(CacheFlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_tuning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cacheflow.toml");
        std::fs::write(&path, "[admission]\nspan_scale = 0.0\n").unwrap();

        assert!(matches!(load_from_file(Some(path)), Err(CacheFlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("local: {}", &PathBuf::from("cacheflow.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
