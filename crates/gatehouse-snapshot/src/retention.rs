//! Retention trimming: keep the newest `max` snapshots, delete the rest.
//!
//! Selection is pure; deletion goes through the store one entry at a time so
//! one failed delete never blocks the others.
use gatehouse_store::RemoteStore;
use tracing::{info, warn};

use crate::types::{RetentionPolicy, SnapshotLayout, SnapshotName, TrimReport};

impl RetentionPolicy {
    /// Snapshots to delete, oldest first. Input order does not matter.
    pub fn stale(&self, snapshots: &[SnapshotName]) -> Vec<SnapshotName> {
        let mut sorted = snapshots.to_vec();
        sorted.sort();
        sorted.dedup();
        let excess = sorted.len().saturating_sub(self.max_snapshots());
        sorted.truncate(excess);
        sorted
    }
}

/// Delete every stale snapshot from the layout's remote directory.
pub async fn trim<S>(store: &S, layout: &SnapshotLayout, snapshots: &[SnapshotName]) -> TrimReport
where
    S: RemoteStore + ?Sized,
{
    let mut report = TrimReport::default();
    for name in layout.retention.stale(snapshots) {
        match store.delete(&layout.remote_path(&name)).await {
            Ok(()) => {
                info!(snapshot = %name, "deleted old snapshot");
                report.deleted.push(name);
            }
            // Someone else already removed it: the goal is reached.
            Err(e) if e.is_not_found() => report.deleted.push(name),
            Err(e) => {
                warn!(snapshot = %name, error = %e, "failed to delete old snapshot");
                report.failed.push((name, e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SnapshotNaming;
    use chrono::{Duration, TimeZone, Utc};
    use gatehouse_store::MemoryStore;

    fn names(count: usize) -> Vec<SnapshotName> {
        let naming = SnapshotNaming::default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| naming.name_at(start + Duration::hours(i as i64)))
            .collect()
    }

    #[test]
    fn stale_under_limit_is_empty() {
        let policy = RetentionPolicy::default();
        assert!(policy.stale(&names(5)).is_empty());
        assert!(policy.stale(&[]).is_empty());
    }

    #[test]
    fn stale_returns_oldest() {
        let all = names(8);
        let mut shuffled = all.clone();
        shuffled.reverse();
        let stale = RetentionPolicy::default().stale(&shuffled);
        assert_eq!(stale, all[..3].to_vec());
    }

    #[tokio::test]
    async fn trim_deletes_all_but_newest() {
        let store = MemoryStore::new();
        let layout = SnapshotLayout::new("backups", "/unused");
        let all = names(7);
        for n in &all {
            store.add_file(&layout.remote_path(n), vec![0]);
        }

        let report = trim(&store, &layout, &all).await;
        assert!(report.is_clean());
        assert_eq!(report.deleted, all[..2].to_vec());

        let left = store.file_names("backups");
        let expected: std::collections::BTreeSet<String> =
            all[2..].iter().map(|n| n.to_string()).collect();
        assert_eq!(left, expected);
    }

    #[tokio::test]
    async fn trim_continues_past_failures() {
        let store = MemoryStore::new();
        let layout = SnapshotLayout::new("backups", "/unused");
        let all = names(9);
        for n in &all {
            store.add_file(&layout.remote_path(n), vec![0]);
        }
        // Second-oldest refuses to go away.
        store.fail_delete_of(&layout.remote_path(&all[1]));

        let report = trim(&store, &layout, &all).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, all[1]);
        assert_eq!(report.deleted, vec![all[0].clone(), all[2].clone(), all[3].clone()]);
        assert_eq!(store.file_names("backups").len(), 6);
    }

    #[tokio::test]
    async fn trim_treats_missing_as_deleted() {
        let store = MemoryStore::new();
        let layout = SnapshotLayout::new("backups", "/unused");
        store.add_dir("backups");
        let all = names(6);
        // Nothing exists remotely; the oldest is still considered gone.
        let report = trim(&store, &layout, &all).await;
        assert_eq!(report.deleted, vec![all[0].clone()]);
        assert!(report.is_clean());
    }
}
