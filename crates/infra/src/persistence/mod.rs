//! File persistence helpers and the metrics snapshot store

pub mod snapshot;

use std::path::Path;

use cacheflow_domain::CacheFlowResult;

pub use snapshot::JsonSnapshotStore;

/// Write `bytes` to `path` through a sibling temp file and a rename
///
/// Parent directories are created as needed.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> CacheFlowResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
