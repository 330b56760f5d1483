//! `gatehouse serve`: the full boot sequence.
//!
//! 1. check `BACKEND_BIN` (fatal if configured and missing)
//! 2. restore the newest snapshot (never fatal)
//! 3. start the backend, if configured
//! 4. start the backup worker, if a remote is configured
//! 5. serve the gate until Ctrl-C / SIGTERM

use std::sync::Arc;

use anyhow::Context;
use gatehouse_gate::GateState;
use gatehouse_snapshot::{restore_latest, BackupWorker};
use gatehouse_store::WebDavStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend;
use crate::config::GatehouseConfig;

pub async fn run(config: GatehouseConfig) -> anyhow::Result<()> {
    let backend_bin = config
        .backend_bin
        .as_deref()
        .map(backend::verify)
        .transpose()?;

    let store = match config.webdav_config()? {
        Some(dav) => Some(Arc::new(WebDavStore::new(dav)?)),
        None => {
            info!("WEBDAV_URL not set, snapshots disabled");
            None
        }
    };
    let layout = config.snapshot_layout();

    restore_latest(store.as_deref(), &layout).await;

    // Held until the end of `run`; dropping it kills the backend.
    let _backend = match &backend_bin {
        Some(bin) => Some(backend::spawn(bin, &config.backend_args).context("failed to start backend")?),
        None => None,
    };

    let cancel = CancellationToken::new();
    let worker = store.map(|store| {
        BackupWorker::new(store, layout, config.backup_schedule()).spawn(cancel.clone())
    });

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    let state = GateState::new(config.gate_config());

    let stop = cancel.clone();
    gatehouse_gate::serve(listener, state, async move {
        shutdown_signal().await;
        info!("shutting down");
        stop.cancel();
    })
    .await
    .context("gate server failed")?;

    cancel.cancel();
    if let Some(worker) = worker {
        let _ = worker.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
