//! Redis-backed remote store
//!
//! Values are stored as JSON strings with `SET key value PX ttl_ms`. Every
//! command runs under the configured command timeout, and any failure,
//! including a timeout, surfaces as `BackendUnavailable`. A stored payload
//! that is not JSON reads as `MetricsCorruption`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cacheflow_core::RemoteStore;
use cacheflow_domain::{CacheFlowError, CacheFlowResult, RemoteConfig};
use redis::aio::ConnectionManager;
use redis::RedisResult;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// [`RemoteStore`] over a multiplexed, auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisRemoteStore {
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisRemoteStore {
    /// Connect using `config`
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unparseable URL and
    /// `BackendUnavailable` when the server cannot be reached within the
    /// connect timeout.
    #[instrument(skip(config))]
    pub async fn connect(config: &RemoteConfig) -> CacheFlowResult<Self> {
        let url = config.connection_url();
        let client = redis::Client::open(url.as_str())
            .map_err(|e| CacheFlowError::InvalidConfig(format!("invalid redis url: {e}")))?;

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let connecting = ConnectionManager::new(client);
        let manager = match tokio::time::timeout(connect_timeout, connecting).await {
            Ok(Ok(manager)) => manager,
            Ok(Err(e)) => {
                return Err(CacheFlowError::BackendUnavailable(format!(
                    "redis connect failed: {e}"
                )))
            }
            Err(_) => {
                return Err(CacheFlowError::BackendUnavailable(format!(
                    "redis connect timed out after {}ms",
                    config.connect_timeout_ms
                )))
            }
        };

        info!(host = %config.host, port = config.port, "Connected to redis");
        Ok(Self { manager, command_timeout: Duration::from_millis(config.command_timeout_ms) })
    }

    async fn run<T, F>(&self, command: &'static str, fut: F) -> CacheFlowResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                Err(CacheFlowError::BackendUnavailable(format!("redis {command} failed: {e}")))
            }
            Err(_) => Err(CacheFlowError::BackendUnavailable(format!(
                "redis {command} timed out after {}ms",
                self.command_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, key: &str) -> CacheFlowResult<Option<Value>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> =
            self.run("GET", redis::cmd("GET").arg(key).query_async(&mut conn)).await?;
        raw.map(|payload| super::decode_remote_payload(key, &payload)).transpose()
    }

    async fn set(&self, key: &str, data: &Value, ttl_ms: u64) -> CacheFlowResult<()> {
        let payload = serde_json::to_string(data)?;
        let mut conn = self.manager.clone();
        let command =
            redis::cmd("SET").arg(key).arg(payload).arg("PX").arg(ttl_ms).query_async(&mut conn);
        let _: () = self.run("SET", command).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_ms: u64) -> CacheFlowResult<bool> {
        let mut conn = self.manager.clone();
        self.run("PEXPIRE", redis::cmd("PEXPIRE").arg(key).arg(ttl_ms).query_async(&mut conn)).await
    }

    async fn used_memory_bytes(&self) -> CacheFlowResult<u64> {
        let mut conn = self.manager.clone();
        let info: String =
            self.run("INFO", redis::cmd("INFO").arg("memory").query_async(&mut conn)).await?;
        let used = parse_used_memory(&info).ok_or_else(|| {
            CacheFlowError::BackendUnavailable(
                "redis INFO reply has no used_memory field".to_string(),
            )
        })?;
        debug!(used_memory = used, "Read redis memory usage");
        Ok(used)
    }
}

/// Extract `used_memory:<bytes>` from an `INFO memory` reply
fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|value| value.trim().parse().ok())
}
