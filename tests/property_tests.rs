use proptest::prelude::*;

use dupe_index::config::Settings;
use dupe_index::error::OffsetError;
use dupe_index::index::{FileRecord, GroupStore, PreferredPathCriteria, RecordId};

fn build_store(sizes: &[u64]) -> (GroupStore, Vec<RecordId>) {
    let store = GroupStore::new();
    let ids = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            store.insert(FileRecord::new(
                format!("/fake/path/{i}"),
                size,
                i as u64,
                1,
                2,
            ))
        })
        .collect();
    (store, ids)
}

proptest! {
    #[test]
    fn size_partitioning_holds(sizes in prop::collection::vec(1u64..50, 0..80)) {
        let (store, _) = build_store(&sizes);

        // Invariant: byte_size agrees with per-size record counts.
        for &size in &sizes {
            let count = sizes.iter().filter(|&&s| s == size).count() as u64;
            prop_assert_eq!(store.byte_size(size), size * count);
        }

        // Invariant: iteration sees every inserted record exactly once.
        let mut seen = 0usize;
        let mut stray = false;
        store.for_each_record(|_, r| {
            stray |= !sizes.contains(&r.size);
            seen += 1;
        });
        prop_assert!(!stray);
        prop_assert_eq!(seen, sizes.len());
    }

    #[test]
    fn store_stays_consistent_under_removal(
        sizes in prop::collection::vec(1u64..20, 1..60),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..30),
    ) {
        let (store, ids) = build_store(&sizes);

        for idx in removals {
            let id = ids[idx.index(ids.len())];
            store.remove(id);
        }

        // Every record reachable by iteration has a live group whose
        // byte_size matches, and group count matches distinct live sizes.
        let mut counts: std::collections::HashMap<u64, u64> = std::collections::HashMap::new();
        store.for_each_record(|_, r| *counts.entry(r.size).or_default() += 1);
        prop_assert_eq!(store.len(), counts.len());
        for (size, count) in counts {
            prop_assert_eq!(store.byte_size(size), size * count);
        }
    }

    #[test]
    fn filter_leaves_only_plausible_groups(sizes in prop::collection::vec(1u64..30, 0..80)) {
        let (store, _) = build_store(&sizes);
        let stats = store.sort_and_filter(&Settings::default(), &PreferredPathCriteria);

        // Inodes are unique here, so nothing is an alias.
        prop_assert_eq!(stats.aliases_removed, 0);

        // Every surviving group has at least two members.
        let mut counts: std::collections::HashMap<u64, u64> = std::collections::HashMap::new();
        store.for_each_record(|_, r| *counts.entry(r.size).or_default() += 1);
        for (&size, &count) in &counts {
            prop_assert!(count >= 2, "size {} survived with {} member(s)", size, count);
        }

        // And sizes are ascending in iteration order.
        let mut last = 0u64;
        let mut ordered = true;
        store.for_each_record(|_, r| {
            ordered &= r.size >= last;
            last = r.size;
        });
        prop_assert!(ordered);
    }

    #[test]
    fn alias_resolution_is_idempotent(
        inodes in prop::collection::vec(1u64..6, 2..40),
    ) {
        // Many records share few inodes: plenty of collisions, all with
        // distinct basenames/parents, so they resolve as hardlink chains.
        let store = GroupStore::new();
        for (i, &inode) in inodes.iter().enumerate() {
            store.insert(FileRecord::new(format!("/d{i}/f{i}"), 100, inode, 1, 10 + i as u64));
        }

        let settings = Settings::default();
        store.sort_and_filter(&settings, &PreferredPathCriteria);
        let second = store.sort_and_filter(&settings, &PreferredPathCriteria);
        prop_assert_eq!(second.aliases_removed, 0);
    }

    #[test]
    fn hardlink_chains_terminate_without_cycles(
        inodes in prop::collection::vec(1u64..5, 2..40),
    ) {
        let store = GroupStore::new();
        let total = inodes.len();
        for (i, &inode) in inodes.iter().enumerate() {
            store.insert(FileRecord::new(format!("/d{i}/f{i}"), 100, inode, 1, 10 + i as u64));
        }
        store.sort_and_filter(&Settings::default(), &PreferredPathCriteria);

        let ids = store.snapshot_ids();
        for &id in &ids {
            // Follow the chain with a step cap; exceeding it means a cycle.
            let mut current = id;
            let mut steps = 0usize;
            while let Some(next) = store.with_record(current, |r| r.hardlink_of()).flatten() {
                current = next;
                steps += 1;
                prop_assert!(steps <= total, "hardlink chain does not terminate");
            }
            // Chain ended at a record with no link.
            prop_assert!(store.with_record(current, |r| r.hardlink_of()).unwrap().is_none());
        }
    }

    #[test]
    fn offset_ordering_is_sorted_per_device(
        entries in prop::collection::vec((1u64..4, 0u64..1_000_000), 2..60),
    ) {
        let store = GroupStore::new();
        for (i, &(device, _)) in entries.iter().enumerate() {
            store.insert(FileRecord::new(format!("/f{i}"), 100, i as u64, device, 2));
        }
        store.sort_and_filter(&Settings::default(), &PreferredPathCriteria);

        let offsets: Vec<u64> = entries.iter().map(|&(_, offset)| offset).collect();
        let lookup = move |record: &FileRecord, _cursor: u64| -> Result<u64, OffsetError> {
            Ok(offsets[record.inode as usize])
        };
        let index = store.into_device_index(&lookup);

        for device in index.devices() {
            let ids = index.records_on(device);
            for pair in ids.windows(2) {
                let a = index.record(pair[0]).unwrap().physical_offset;
                let b = index.record(pair[1]).unwrap().physical_offset;
                prop_assert!(a <= b);
            }
        }
    }
}
