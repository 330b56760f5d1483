//! Snapshot types: constants, names, layout, outcomes and events.
//!
//! Snapshot names are fixed-width and timestamp-ordered, so lexicographic
//! order is chronological order. Restore (pick the maximum) and retention
//! (keep the last K) both rely on it.
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::SnapshotError;

// ── Constants ────────────────────────────────────────────────────────────

/// Maximum snapshots kept in the remote directory.
pub const MAX_SNAPSHOTS: usize = 5;

/// Default file name prefix.
pub const DEFAULT_PREFIX: &str = "backup_";

/// Archive extension (gzip-compressed tar).
pub const ARCHIVE_EXT: &str = "tar.gz";

/// Timestamp layout inside a name. UTC, second granularity.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Interval floor. Shorter intervals are clamped up to this.
pub const MIN_BACKUP_INTERVAL: Duration = Duration::from_secs(60);

/// Default interval between backup cycles (10 minutes).
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(600);

/// Delay before the first cycle, so the backend can finish starting.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(60);

// ── Names ────────────────────────────────────────────────────────────────

/// A validated snapshot file name, e.g. `backup_20240131_235959.tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotName(String);

impl SnapshotName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Naming convention: `<prefix><YYYYMMDD_HHMMSS>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNaming {
    prefix: String,
    ext: String,
}

impl Default for SnapshotNaming {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl SnapshotNaming {
    /// Names with the given prefix and the `tar.gz` extension.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ext: ARCHIVE_EXT.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The name for a snapshot taken at `at`.
    pub fn name_at(&self, at: DateTime<Utc>) -> SnapshotName {
        SnapshotName(format!(
            "{}{}.{}",
            self.prefix,
            at.format(TIMESTAMP_FORMAT),
            self.ext
        ))
    }

    /// Validate a remote file name against the convention.
    pub fn parse(&self, name: &str) -> Option<SnapshotName> {
        let stamp = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.ext.as_str())?
            .strip_suffix('.')?;
        let shape_ok = stamp.len() == 15
            && stamp.bytes().enumerate().all(|(i, b)| match i {
                8 => b == b'_',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok || NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_err() {
            return None;
        }
        Some(SnapshotName(name.to_string()))
    }

    /// Keep only valid snapshot names, oldest first.
    pub fn filter<'a, I>(&self, names: I) -> Vec<SnapshotName>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut out: Vec<SnapshotName> = names.into_iter().filter_map(|n| self.parse(n)).collect();
        out.sort();
        out.dedup();
        out
    }

    /// The most recent valid name, if any.
    pub fn latest<'a, I>(&self, names: I) -> Option<SnapshotName>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().filter_map(|n| self.parse(n)).max()
    }
}

// ── Retention ────────────────────────────────────────────────────────────

/// How many snapshots survive a trimming pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_snapshots: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_snapshots: MAX_SNAPSHOTS,
        }
    }
}

impl RetentionPolicy {
    /// At least one snapshot is always kept.
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Where snapshots come from and go to.
///
/// `scratch_dir` holds temporary archives and must not live inside
/// `state_dir`, otherwise a backup would pack its own archive.
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    pub(crate) remote_dir: String,
    pub(crate) state_dir: PathBuf,
    pub(crate) scratch_dir: PathBuf,
    pub(crate) naming: SnapshotNaming,
    pub(crate) retention: RetentionPolicy,
}

impl SnapshotLayout {
    pub fn new(remote_dir: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_dir: gatehouse_store::normalize(&remote_dir.into()),
            state_dir: state_dir.into(),
            scratch_dir: std::env::temp_dir().join("gatehouse"),
            naming: SnapshotNaming::default(),
            retention: RetentionPolicy::default(),
        }
    }

    /// Directory for temporary archives (default: `$TMPDIR/gatehouse`).
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn naming(mut self, naming: SnapshotNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    pub fn state_dir(&self) -> &std::path::Path {
        &self.state_dir
    }

    /// Remote path of a snapshot.
    pub fn remote_path(&self, name: &SnapshotName) -> String {
        gatehouse_store::join(&self.remote_dir, name.as_str())
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// Result of one trimming pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimReport {
    /// Snapshots deleted, oldest first.
    pub deleted: Vec<SnapshotName>,
    /// Snapshots whose deletion failed, with the error text.
    pub failed: Vec<(SnapshotName, String)>,
}

impl TrimReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What the boot-time restore did.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// No remote target configured.
    NotConfigured,
    /// The remote snapshot directory does not exist yet.
    FreshDeployment,
    /// The directory exists but holds no valid snapshot.
    NoSnapshots,
    /// Local state was replaced with this snapshot.
    Restored { snapshot: SnapshotName },
    /// Restore was abandoned; local state is whatever it was (possibly partial).
    Failed { error: SnapshotError },
}

/// Summary of a successful backup cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: SnapshotName,
    /// Archive size in bytes.
    pub bytes: u64,
    pub trim: TrimReport,
}

/// Events emitted by the backup worker.
#[derive(Debug, Clone)]
pub enum BackupEvent {
    /// A cycle packed, uploaded and trimmed.
    CycleCompleted(CycleReport),
    /// A cycle was skipped after an error. The loop carries on.
    CycleFailed { error: String },
}
