//! Runtime bootstrap
//!
//! [`initialize`] turns an [`EngineConfig`] into a running engine:
//!
//! 1. Builds the local store (JSON document when `persist_path` is set,
//!    process memory otherwise) and the remote store
//! 2. Restores the metrics snapshot kept next to the local document
//! 3. Starts the sweep scheduler when a local backend is configured
//!
//! [`CacheFlowRuntime::shutdown`] stops the scheduler and saves the
//! snapshot again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cacheflow_core::{CacheEngine, ExpirationSweeper, LocalStore, MetricsRepository, RemoteStore};
use cacheflow_domain::constants::LOCAL_STORE_FILE;
use cacheflow_domain::{CacheFlowResult, EngineConfig, LocalConfig, RemoteConfig};
use tracing::{info, instrument, warn};

use crate::persistence::JsonSnapshotStore;
use crate::scheduling::{SweepScheduler, SweepSchedulerConfig};
use crate::stores::{JsonFileLocalStore, MemoryLocalStore};

/// A configured engine plus the background work that keeps it tidy
pub struct CacheFlowRuntime {
    engine: Arc<CacheEngine>,
    scheduler: Option<SweepScheduler>,
    snapshots: Option<JsonSnapshotStore>,
}

impl CacheFlowRuntime {
    pub fn engine(&self) -> Arc<CacheEngine> {
        Arc::clone(&self.engine)
    }

    /// Whether the sweep scheduler task is active
    pub fn is_sweeping(&self) -> bool {
        self.scheduler.as_ref().is_some_and(SweepScheduler::is_running)
    }

    /// Write the current metrics snapshot, if persistence is configured
    pub async fn save_metrics(&self) -> CacheFlowResult<()> {
        if let Some(snapshots) = &self.snapshots {
            snapshots.save(&self.engine.snapshot()).await?;
        }
        Ok(())
    }

    /// Stop the sweep scheduler and persist metrics
    ///
    /// # Errors
    /// Returns an error when the scheduler task does not finish within its
    /// join timeout or the snapshot cannot be written.
    #[instrument(skip(self))]
    pub async fn shutdown(mut self) -> CacheFlowResult<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            if scheduler.is_running() {
                scheduler.stop().await?;
            }
        }

        self.save_metrics().await?;
        info!("CacheFlow runtime shut down");
        Ok(())
    }
}

/// Build stores, engine and sweeper from `config`
///
/// Must be called inside a Tokio runtime when a local backend is configured,
/// since the sweep scheduler is spawned here.
///
/// # Errors
/// Returns `InvalidConfig` for an invalid configuration, `MetricsCorruption`
/// for an unreadable local document or snapshot, and `BackendUnavailable`
/// when the remote server cannot be reached.
#[instrument(skip(config))]
pub async fn initialize(config: EngineConfig) -> CacheFlowResult<CacheFlowRuntime> {
    config.validate()?;

    if config.local.is_none() && config.remote.is_none() {
        warn!("No backend configured; every cache call will fail with InvalidConfig");
    }

    let metrics = Arc::new(MetricsRepository::new());
    let mut engine = CacheEngine::new(config.effective_tuning()).with_metrics(Arc::clone(&metrics));

    let local = match &config.local {
        Some(local_config) => Some(build_local_store(local_config).await?),
        None => None,
    };
    if let Some(local) = &local {
        engine = engine.with_local_store(Arc::clone(local));
    }

    let remote = match &config.remote {
        Some(remote_config) => Some(build_remote_store(remote_config).await?),
        None => None,
    };
    if let Some(remote) = &remote {
        engine = engine.with_remote_store(Arc::clone(remote));
    }

    let snapshots = config
        .local
        .as_ref()
        .and_then(|local_config| local_config.persist_path.as_deref())
        .map(|path| {
            let document = local_document_path(path);
            JsonSnapshotStore::new(document.parent().unwrap_or_else(|| Path::new(".")))
        });

    if let Some(store) = &snapshots {
        if let Some(snapshot) = store.load().await? {
            engine.restore(snapshot)?;
        }
    }

    let scheduler = match (&config.local, local) {
        (Some(local_config), Some(local)) => {
            let mut sweeper = ExpirationSweeper::new(local, Arc::clone(&metrics));
            if let Some(remote) = remote {
                sweeper = sweeper.with_remote_store(remote);
            }
            let interval = Duration::from_secs(local_config.check_expire_interval_seconds);
            let mut scheduler =
                SweepScheduler::new(Arc::new(sweeper), SweepSchedulerConfig::every(interval))?;
            scheduler.start()?;
            Some(scheduler)
        }
        _ => None,
    };

    info!(
        local = config.local.is_some(),
        remote = config.remote.is_some(),
        restored_resolvers = metrics.len(),
        "CacheFlow runtime initialized"
    );

    Ok(CacheFlowRuntime { engine: Arc::new(engine), scheduler, snapshots })
}

async fn build_local_store(config: &LocalConfig) -> CacheFlowResult<Arc<dyn LocalStore>> {
    match &config.persist_path {
        Some(path) => Ok(Arc::new(JsonFileLocalStore::open(local_document_path(path)).await?)),
        None => Ok(Arc::new(MemoryLocalStore::new())),
    }
}

/// A directory `persist_path` holds the document under its default name
fn local_document_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(LOCAL_STORE_FILE)
    } else {
        path.to_path_buf()
    }
}

#[cfg(feature = "redis")]
async fn build_remote_store(config: &RemoteConfig) -> CacheFlowResult<Arc<dyn RemoteStore>> {
    Ok(Arc::new(crate::stores::RedisRemoteStore::connect(config).await?))
}

#[cfg(not(feature = "redis"))]
async fn build_remote_store(config: &RemoteConfig) -> CacheFlowResult<Arc<dyn RemoteStore>> {
    warn!(
        host = %config.host,
        "Built without the redis feature; using the in-process remote store"
    );
    Ok(Arc::new(crate::stores::MemoryRemoteStore::new()))
}
