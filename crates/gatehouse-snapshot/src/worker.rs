//! Backup worker: periodic pack → upload → trim.
//!
//! One long-lived task. A failed cycle is logged and skipped; the schedule
//! itself only ends when the cancellation token fires.
//!
//! ```text
//! Idle → Warmup → { Cycle: Pack → Upload → Trim } → Idle(sleep) → Cycle → …
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gatehouse_store::RemoteStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive;
use crate::error::SnapshotError;
use crate::retention;
use crate::types::{
    BackupEvent, CycleReport, SnapshotLayout, DEFAULT_BACKUP_INTERVAL, DEFAULT_WARMUP,
    MIN_BACKUP_INTERVAL,
};

// ── Schedule ─────────────────────────────────────────────────────────────

/// Timing of the backup loop.
///
/// ```rust
/// use std::time::Duration;
/// use gatehouse_snapshot::{BackupSchedule, MIN_BACKUP_INTERVAL};
///
/// let schedule = BackupSchedule::new().interval(Duration::from_secs(5));
/// assert_eq!(schedule.interval_duration(), MIN_BACKUP_INTERVAL);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSchedule {
    warmup: Duration,
    interval: Duration,
}

impl Default for BackupSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupSchedule {
    pub fn new() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            interval: DEFAULT_BACKUP_INTERVAL,
        }
    }

    /// Delay before the first cycle (default: 60 s).
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Sleep between cycles (default: 600 s). Clamped to [`MIN_BACKUP_INTERVAL`].
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_BACKUP_INTERVAL);
        self
    }

    pub fn warmup_duration(&self) -> Duration {
        self.warmup
    }

    pub fn interval_duration(&self) -> Duration {
        self.interval
    }
}

// ── Worker ───────────────────────────────────────────────────────────────

/// Periodically snapshots the local state directory to a remote store.
pub struct BackupWorker<S: ?Sized> {
    store: Arc<S>,
    layout: SnapshotLayout,
    schedule: BackupSchedule,
    events: Option<mpsc::Sender<BackupEvent>>,
}

impl<S> BackupWorker<S>
where
    S: RemoteStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, layout: SnapshotLayout, schedule: BackupSchedule) -> Self {
        Self {
            store,
            layout,
            schedule,
            events: None,
        }
    }

    /// Report every cycle outcome on `tx`. Sends never block the loop.
    pub fn with_events(mut self, tx: mpsc::Sender<BackupEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn schedule(&self) -> &BackupSchedule {
        &self.schedule
    }

    /// Run one cycle stamped with the current time.
    pub async fn run_cycle(&self) -> Result<CycleReport, SnapshotError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle, naming the snapshot after `now`.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, SnapshotError> {
        let remote_dir = self.layout.remote_dir();
        self.store.ensure_dir(remote_dir).await?;

        let snapshot = self.layout.naming.name_at(now);
        tokio::fs::create_dir_all(&self.layout.scratch_dir).await?;
        let local = self.layout.scratch_dir.join(snapshot.as_str());

        let packed = archive::pack_dir(self.layout.state_dir.clone(), local.clone()).await;
        let uploaded = match packed {
            Ok(bytes) => {
                debug!(snapshot = %snapshot, bytes, "packed local state");
                self.store
                    .upload(&local, &self.layout.remote_path(&snapshot))
                    .await
                    .map(|()| bytes)
                    .map_err(SnapshotError::from)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = tokio::fs::remove_file(&local).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %local.display(), error = %e, "failed to remove local archive");
            }
        }
        let bytes = uploaded?;

        let names = self.store.list(remote_dir).await?;
        let snapshots = self.layout.naming.filter(&names);
        let trim = retention::trim(self.store.as_ref(), &self.layout, &snapshots).await;

        Ok(CycleReport {
            snapshot,
            bytes,
            trim,
        })
    }

    /// Run forever: warm-up, then one cycle per interval, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            warmup_secs = self.schedule.warmup.as_secs(),
            interval_secs = self.schedule.interval.as_secs(),
            remote_dir = self.layout.remote_dir(),
            "backup worker started"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("backup worker cancelled during warm-up");
                return;
            }
            _ = tokio::time::sleep(self.schedule.warmup) => {}
        }

        loop {
            // Cancellation also interrupts a cycle in flight; a half-done
            // upload is abandoned and the next boot backs up again.
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("backup worker cancelled mid-cycle");
                    break;
                }
                result = self.run_cycle() => result,
            };
            let event = match result {
                Ok(report) => {
                    info!(
                        snapshot = %report.snapshot,
                        bytes = report.bytes,
                        trimmed = report.trim.deleted.len(),
                        trim_failures = report.trim.failed.len(),
                        "backup cycle completed"
                    );
                    BackupEvent::CycleCompleted(report)
                }
                Err(e) => {
                    warn!(error = %e, "backup cycle failed, skipping");
                    BackupEvent::CycleFailed {
                        error: e.to_string(),
                    }
                }
            };
            if let Some(tx) = &self.events {
                let _ = tx.try_send(event);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.schedule.interval) => {}
            }
        }
        info!("backup worker stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped() {
        let s = BackupSchedule::new().interval(Duration::from_secs(1));
        assert_eq!(s.interval_duration(), MIN_BACKUP_INTERVAL);
        let s = BackupSchedule::new().interval(Duration::from_secs(3600));
        assert_eq!(s.interval_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn defaults() {
        let s = BackupSchedule::default();
        assert_eq!(s.warmup_duration(), DEFAULT_WARMUP);
        assert_eq!(s.interval_duration(), DEFAULT_BACKUP_INTERVAL);
    }

    #[test]
    fn warmup_is_not_clamped() {
        let s = BackupSchedule::new().warmup(Duration::ZERO);
        assert_eq!(s.warmup_duration(), Duration::ZERO);
    }
}
