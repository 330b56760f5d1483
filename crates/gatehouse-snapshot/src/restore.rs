//! Boot-time restore of the local state directory.
//!
//! Runs once, before the backend starts, so nothing else touches the state
//! directory meanwhile. Never fails the boot: every error becomes
//! [`RestoreOutcome::Failed`] and startup proceeds with whatever is on disk.

use std::path::Path;

use gatehouse_store::RemoteStore;
use tracing::{info, warn};

use crate::archive;
use crate::error::SnapshotError;
use crate::types::{RestoreOutcome, SnapshotLayout, SnapshotName};

/// Replace local state with the newest remote snapshot, if there is one.
///
/// `store` is `None` when no remote target is configured.
pub async fn restore_latest<S>(store: Option<&S>, layout: &SnapshotLayout) -> RestoreOutcome
where
    S: RemoteStore + ?Sized,
{
    let Some(store) = store else {
        info!("no remote store configured, skipping restore");
        return RestoreOutcome::NotConfigured;
    };

    match try_restore(store, layout).await {
        Ok(outcome) => {
            match &outcome {
                RestoreOutcome::FreshDeployment => info!(
                    remote_dir = layout.remote_dir(),
                    "remote snapshot directory absent, treating as fresh deployment"
                ),
                RestoreOutcome::NoSnapshots => {
                    info!(remote_dir = layout.remote_dir(), "no snapshots to restore")
                }
                RestoreOutcome::Restored { snapshot } => {
                    info!(snapshot = %snapshot, state_dir = %layout.state_dir().display(), "restored local state")
                }
                _ => {}
            }
            outcome
        }
        Err(error) => {
            warn!(error = %error, "restore failed, continuing with existing local state");
            RestoreOutcome::Failed { error }
        }
    }
}

async fn try_restore<S>(store: &S, layout: &SnapshotLayout) -> Result<RestoreOutcome, SnapshotError>
where
    S: RemoteStore + ?Sized,
{
    if !store.dir_exists(layout.remote_dir()).await? {
        return Ok(RestoreOutcome::FreshDeployment);
    }

    let names = store.list(layout.remote_dir()).await?;
    let Some(latest) = layout.naming.latest(&names) else {
        return Ok(RestoreOutcome::NoSnapshots);
    };

    tokio::fs::create_dir_all(&layout.scratch_dir).await?;
    let download = layout.scratch_dir.join(latest.as_str());
    let result = fetch_and_replace(store, layout, &latest, &download).await;
    if let Err(e) = tokio::fs::remove_file(&download).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %download.display(), error = %e, "failed to remove downloaded archive");
        }
    }
    result?;

    Ok(RestoreOutcome::Restored { snapshot: latest })
}

/// Download first, then wipe and extract. A failed download leaves local
/// state untouched; a failed extraction may leave it partial.
async fn fetch_and_replace<S>(
    store: &S,
    layout: &SnapshotLayout,
    snapshot: &SnapshotName,
    download: &Path,
) -> Result<(), SnapshotError>
where
    S: RemoteStore + ?Sized,
{
    info!(snapshot = %snapshot, "downloading snapshot");
    store.download(&layout.remote_path(snapshot), download).await?;

    match tokio::fs::remove_dir_all(&layout.state_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(&layout.state_dir).await?;
    archive::unpack(download.to_path_buf(), layout.state_dir.clone()).await
}
