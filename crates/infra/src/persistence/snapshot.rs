//! JSON persistence for metrics snapshots
//!
//! A snapshot lands in `<dir>/metrics.json`. Loading validates the document
//! before handing it back, so a restored repository is never half-built from
//! a corrupt file.

use std::path::{Path, PathBuf};

use cacheflow_domain::constants::METRICS_SNAPSHOT_FILE;
use cacheflow_domain::{CacheFlowError, CacheFlowResult, MetricsSnapshot};
use tracing::{info, instrument};

use super::write_atomic;

/// Saves and loads [`MetricsSnapshot`]s under a directory
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(METRICS_SNAPSHOT_FILE) }
    }

    /// Location of the snapshot document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` atomically, replacing any previous document
    #[instrument(skip(self, snapshot), fields(resolvers = snapshot.resolvers.len()))]
    pub async fn save(&self, snapshot: &MetricsSnapshot) -> CacheFlowResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &bytes).await?;
        info!(path = %self.path.display(), "Metrics snapshot saved");
        Ok(())
    }

    /// Read the snapshot, or `None` when no document exists yet
    ///
    /// # Errors
    /// Returns `MetricsCorruption` if the document does not parse or fails
    /// [`MetricsSnapshot::validate`].
    #[instrument(skip(self))]
    pub async fn load(&self) -> CacheFlowResult<Option<MetricsSnapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: MetricsSnapshot = serde_json::from_str(&contents).map_err(|e| {
            CacheFlowError::MetricsCorruption(format!(
                "snapshot {} is malformed: {e}",
                self.path.display()
            ))
        })?;
        snapshot.validate()?;

        info!(
            path = %self.path.display(),
            resolvers = snapshot.resolvers.len(),
            "Metrics snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
