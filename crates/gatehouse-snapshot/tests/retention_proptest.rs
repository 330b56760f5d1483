use chrono::{TimeZone, Utc};
use gatehouse_snapshot::{RetentionPolicy, SnapshotName, SnapshotNaming};
use proptest::prelude::*;

/// Distinct snapshot names built from second offsets after 2020-01-01.
fn names_from(offsets: &[u32]) -> Vec<SnapshotName> {
    let naming = SnapshotNaming::default();
    let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let mut names: Vec<SnapshotName> = offsets
        .iter()
        .map(|s| naming.name_at(base + chrono::Duration::seconds(*s as i64)))
        .collect();
    names.sort();
    names.dedup();
    names
}

proptest! {
    /// After trimming, exactly the `max` greatest names survive.
    #[test]
    fn survivors_are_the_newest(
        offsets in prop::collection::vec(0u32..400_000_000, 0..40),
        max in 1usize..10,
    ) {
        let names = names_from(&offsets);
        let policy = RetentionPolicy::new(max);
        let stale = policy.stale(&names);

        let survivors: Vec<_> = names.iter().filter(|n| !stale.contains(n)).cloned().collect();
        prop_assert_eq!(survivors.len(), names.len().min(max));

        let mut expected = names.clone();
        expected.reverse();
        expected.truncate(max);
        expected.reverse();
        prop_assert_eq!(survivors, expected);
    }

    /// Every stale name is older than every survivor.
    #[test]
    fn stale_precede_survivors(
        offsets in prop::collection::vec(0u32..400_000_000, 0..40),
    ) {
        let names = names_from(&offsets);
        let stale = RetentionPolicy::default().stale(&names);
        if let Some(newest_stale) = stale.last() {
            for n in names.iter().filter(|n| !stale.contains(n)) {
                prop_assert!(n > newest_stale);
            }
        }
    }

    /// Lexicographic order of names equals chronological order.
    #[test]
    fn name_order_is_time_order(a in 0u32..400_000_000, b in 0u32..400_000_000) {
        let naming = SnapshotNaming::default();
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let na = naming.name_at(base + chrono::Duration::seconds(a as i64));
        let nb = naming.name_at(base + chrono::Duration::seconds(b as i64));
        prop_assert_eq!(na.cmp(&nb), a.cmp(&b));
    }

    /// Generated names always parse back.
    #[test]
    fn generated_names_parse(s in 0u32..400_000_000) {
        let naming = SnapshotNaming::new("alist_backup_");
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let name = naming.name_at(base + chrono::Duration::seconds(s as i64));
        prop_assert_eq!(naming.parse(name.as_str()), Some(name));
    }
}
