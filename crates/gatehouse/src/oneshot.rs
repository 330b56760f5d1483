//! `gatehouse restore` and `gatehouse backup-now`.

use anyhow::{bail, Context};
use gatehouse_snapshot::{restore_latest, BackupWorker, RestoreOutcome};
use gatehouse_store::WebDavStore;

use crate::config::GatehouseConfig;

fn store(config: &GatehouseConfig) -> anyhow::Result<Option<WebDavStore>> {
    match config.webdav_config()? {
        Some(dav) => Ok(Some(WebDavStore::new(dav)?)),
        None => Ok(None),
    }
}

/// Run the restorer once. Fails only when a restore was attempted and broke.
pub async fn restore(config: &GatehouseConfig) -> anyhow::Result<()> {
    let store = store(config)?;
    match restore_latest(store.as_ref(), &config.snapshot_layout()).await {
        RestoreOutcome::Restored { snapshot } => {
            eprintln!("restored {snapshot} into {}", config.data_dir.display());
        }
        RestoreOutcome::NotConfigured => eprintln!("WEBDAV_URL not set, nothing to restore"),
        RestoreOutcome::FreshDeployment => eprintln!("no remote snapshot directory yet"),
        RestoreOutcome::NoSnapshots => eprintln!("remote directory holds no snapshots"),
        RestoreOutcome::Failed { error } => bail!("restore failed: {error}"),
    }
    Ok(())
}

/// Run exactly one backup cycle.
pub async fn backup_now(config: &GatehouseConfig) -> anyhow::Result<()> {
    let Some(store) = store(config)? else {
        bail!("WEBDAV_URL not set, backups are disabled");
    };
    let worker = BackupWorker::new(
        std::sync::Arc::new(store),
        config.snapshot_layout(),
        config.backup_schedule(),
    );
    let report = worker.run_cycle().await.context("backup cycle failed")?;
    eprintln!(
        "uploaded {} ({} bytes), trimmed {}",
        report.snapshot,
        report.bytes,
        report.trim.deleted.len()
    );
    for (name, error) in &report.trim.failed {
        eprintln!("  could not delete {name}: {error}");
    }
    Ok(())
}
