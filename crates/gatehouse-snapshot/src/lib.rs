//! Gatehouse snapshot lifecycle.
//!
//! Keeps the backend's state directory durable across redeployments:
//!
//! - **Restore** (once, at boot): newest remote snapshot replaces local state
//! - **Worker** (forever): pack → upload → trim on an interval
//! - **Retention**: only the newest [`MAX_SNAPSHOTS`] survive a trim
//!
//! Remote I/O goes through [`gatehouse_store::RemoteStore`].
pub mod archive;
pub mod error;
pub mod restore;
pub mod retention;
pub mod types;
pub mod worker;

pub use error::SnapshotError;
pub use restore::restore_latest;
pub use retention::trim;
pub use types::{
    BackupEvent, CycleReport, RestoreOutcome, RetentionPolicy, SnapshotLayout, SnapshotName,
    SnapshotNaming, TrimReport, ARCHIVE_EXT, DEFAULT_BACKUP_INTERVAL, DEFAULT_PREFIX,
    DEFAULT_WARMUP, MAX_SNAPSHOTS, MIN_BACKUP_INTERVAL, TIMESTAMP_FORMAT,
};
pub use worker::{BackupSchedule, BackupWorker};
