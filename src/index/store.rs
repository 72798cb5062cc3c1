//! Size-keyed group store with lock-guarded mutation and iteration.
//!
//! # Overview
//!
//! The [`GroupStore`] is the top-level container of the scan: an ordered
//! collection of [`Group`]s (one per distinct byte size) plus a size lookup
//! index, both behind a single mutex. Discovery threads insert records
//! concurrently; once discovery finishes, [`GroupStore::sort_and_filter`]
//! runs the combined pass that orders groups by size, resolves same-file
//! aliases, and rejects groups that cannot yield an actionable duplicate
//! set. Surviving records are handed off to the device offset indexer via
//! [`GroupStore::into_device_index`].
//!
//! Locking discipline: the mutex is non-reentrant, so every multi-step pass
//! is a method on the inner state taking `&mut self`. No public operation
//! calls another public operation while holding the lock.
//!
//! # Example
//!
//! ```
//! use dupe_index::config::Settings;
//! use dupe_index::index::{FileRecord, GroupStore, PreferredPathCriteria};
//!
//! let store = GroupStore::new();
//! store.insert(FileRecord::new("/data/a.bin", 4096, 10, 1, 100));
//! store.insert(FileRecord::new("/data/b.bin", 4096, 11, 1, 100));
//! store.insert(FileRecord::new("/data/c.bin", 512, 12, 1, 100));
//!
//! let stats = store.sort_and_filter(&Settings::default(), &PreferredPathCriteria);
//! // The lone 512-byte file cannot be part of a duplicate set.
//! assert_eq!(stats.groups_rejected, 1);
//! assert_eq!(store.len(), 1);
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use bytesize::ByteSize;
use serde::Serialize;

use crate::config::Settings;
use crate::index::devlist::{DeviceIndex, OffsetLookup};
use crate::index::record::{Checksum, FileRecord, RecordArena, RecordId, MIDDLE_BYTES_LEN};
use crate::index::resolve::{
    cmp_identity, count_preferred, resolve_aliases, OriginalCriteria,
};

/// An ordered set of records sharing one byte size.
#[derive(Debug)]
pub struct Group {
    size: u64,
    members: Vec<RecordId>,
}

impl Group {
    fn new(size: u64) -> Self {
        Self {
            size,
            members: Vec::new(),
        }
    }

    /// Byte size shared by every member.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Member ids in group order.
    #[must_use]
    pub fn members(&self) -> &[RecordId] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total bytes covered: `size * member_count`. Members share the
    /// declared size by invariant, so no per-member summing is needed.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.size * self.members.len() as u64
    }
}

/// Counters from the combined sort/resolve/filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    /// Groups present when the pass started.
    pub groups_examined: usize,
    /// Records removed as path aliases.
    pub aliases_removed: usize,
    /// Groups cleared by the admission filter.
    pub groups_rejected: usize,
    /// Groups remaining after the pass.
    pub surviving_groups: usize,
    /// Records remaining after the pass.
    pub surviving_files: usize,
    /// Bytes covered by the surviving records.
    pub surviving_bytes: u64,
}

impl PruneStats {
    /// Percentage of groups rejected by the pass.
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        if self.groups_examined == 0 {
            0.0
        } else {
            (self.groups_rejected as f64 / self.groups_examined as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: RecordArena,
    groups: Vec<Group>,
    by_size: HashMap<u64, usize>,
}

impl StoreInner {
    fn insert(&mut self, record: FileRecord) -> RecordId {
        let size = record.size;
        let id = self.records.insert(record);
        match self.by_size.get(&size) {
            Some(&idx) => {
                debug_assert_eq!(self.groups[idx].size, size);
                self.groups[idx].members.push(id);
            }
            None => {
                self.by_size.insert(size, self.groups.len());
                let mut group = Group::new(size);
                group.members.push(id);
                self.groups.push(group);
            }
        }
        id
    }

    fn remove(&mut self, id: RecordId) -> bool {
        let Some(record) = self.records.get(id) else {
            return false;
        };
        let size = record.size;
        let &gidx = self
            .by_size
            .get(&size)
            .expect("record alive but its size group is missing");
        let group = &mut self.groups[gidx];
        let pos = group
            .members
            .iter()
            .position(|&m| m == id)
            .expect("record not present in its claimed group");
        group.members.remove(pos);
        self.records.remove(id);
        if group.members.is_empty() {
            self.remove_group_at(gidx);
        }
        true
    }

    fn clear(&mut self, size: u64) -> usize {
        let Some(&idx) = self.by_size.get(&size) else {
            return 0;
        };
        let group = self.remove_group_at(idx);
        for &id in &group.members {
            self.records.remove(id);
        }
        group.members.len()
    }

    /// Detach a group, keeping both indices consistent. The caller owns the
    /// members' fate.
    fn remove_group_at(&mut self, idx: usize) -> Group {
        let group = self.groups.swap_remove(idx);
        self.by_size.remove(&group.size);
        if let Some(moved) = self.groups.get(idx) {
            self.by_size.insert(moved.size, idx);
        }
        group
    }

    fn rebuild_index(&mut self) {
        self.by_size.clear();
        for (idx, group) in self.groups.iter().enumerate() {
            self.by_size.insert(group.size, idx);
        }
    }

    fn snapshot_ids(&self) -> Vec<RecordId> {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter().copied())
            .collect()
    }

    fn sort_and_filter(
        &mut self,
        settings: &Settings,
        criteria: &dyn OriginalCriteria,
    ) -> PruneStats {
        let mut stats = PruneStats {
            groups_examined: self.groups.len(),
            ..PruneStats::default()
        };

        self.groups.sort_by_key(Group::size);

        let groups = std::mem::take(&mut self.groups);
        let mut retained = Vec::with_capacity(groups.len());
        for mut group in groups {
            let mut num_pref = 0;
            let mut num_nonpref = 0;
            if group.members.len() >= 2 {
                // Counts are taken before aliases are removed; the filter
                // judges the group as discovery saw it.
                (num_pref, num_nonpref) = count_preferred(&self.records, &group.members);
                let records = &self.records;
                group.members.sort_by(|&a, &b| {
                    cmp_identity(
                        records.get(a).expect("group member not live in arena"),
                        records.get(b).expect("group member not live in arena"),
                    )
                });
                stats.aliases_removed +=
                    resolve_aliases(&mut self.records, &mut group.members, settings, criteria);
            }

            let reject = group.members.len() < 2
                || (settings.must_match_original && num_pref == 0)
                || (settings.keep_all_originals && num_nonpref == 0);

            if reject {
                log::debug!(
                    "Rejecting size-{} group ({} members, {} preferred)",
                    group.size,
                    group.members.len(),
                    num_pref
                );
                stats.groups_rejected += 1;
                for &id in &group.members {
                    self.records.remove(id);
                }
            } else {
                stats.surviving_files += group.members.len();
                stats.surviving_bytes += group.byte_size();
                retained.push(group);
            }
        }
        self.groups = retained;
        self.rebuild_index();
        stats.surviving_groups = self.groups.len();

        log::info!(
            "Candidate pruning: {} groups in, {} rejected, {} aliases removed; {} files ({}) remain",
            stats.groups_examined,
            stats.groups_rejected,
            stats.aliases_removed,
            stats.surviving_files,
            ByteSize(stats.surviving_bytes)
        );

        stats
    }

    fn dump(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        for group in &self.groups {
            for &id in &group.members {
                let record = self
                    .records
                    .get(id)
                    .expect("group member not live in arena");
                writeln!(
                    writer,
                    "  {}:{}:{}:{}:{}",
                    record.physical_offset,
                    record.size,
                    record.device,
                    record.inode,
                    record.path.display()
                )?;
            }
            writeln!(writer, "----")?;
        }
        Ok(())
    }
}

/// Thread-safe, size-partitioned registry of discovered files.
///
/// See the [module docs](self) for the locking discipline and lifecycle.
#[derive(Debug, Default)]
pub struct GroupStore {
    inner: Mutex<StoreInner>,
}

impl GroupStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the group matching its size, creating the group
    /// if absent. Safe to call from concurrent discovery threads.
    pub fn insert(&self, record: FileRecord) -> RecordId {
        let id = self.inner.lock().unwrap().insert(record);
        log::trace!("Inserted record {id}");
        id
    }

    /// Remove a record from its owning group and destroy it. The group is
    /// deleted from both indices the moment it becomes empty.
    ///
    /// Returns `false` if the id was already dead.
    pub fn remove(&self, id: RecordId) -> bool {
        self.inner.lock().unwrap().remove(id)
    }

    /// Drop the group keyed by `size` and destroy all its members in one
    /// step. Returns the number of records destroyed.
    pub fn clear(&self, size: u64) -> usize {
        self.inner.lock().unwrap().clear(size)
    }

    /// Number of live groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().groups.len()
    }

    /// Whether the store holds no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live records across all groups.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Bytes covered by the group keyed by `size`, i.e. `size * members`.
    /// Zero when no such group exists.
    #[must_use]
    pub fn byte_size(&self, size: u64) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner
            .by_size
            .get(&size)
            .map_or(0, |&idx| inner.groups[idx].byte_size())
    }

    /// Ids of every live record, in group order then intra-group order.
    ///
    /// The snapshot is the restartable iteration surface: it stays valid as
    /// a cursor even while the store keeps mutating (ids of removed records
    /// simply stop resolving).
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<RecordId> {
        self.inner.lock().unwrap().snapshot_ids()
    }

    /// Visit every live group under the lock, in store order. For progress
    /// reporting collaborators that need per-group sizes and counts.
    pub fn for_each_group<F: FnMut(&Group)>(&self, mut f: F) {
        let inner = self.inner.lock().unwrap();
        for group in &inner.groups {
            f(group);
        }
    }

    /// Visit every live record under the lock, in group order then
    /// intra-group order.
    pub fn for_each_record<F: FnMut(RecordId, &FileRecord)>(&self, mut f: F) {
        let inner = self.inner.lock().unwrap();
        for group in &inner.groups {
            for &id in &group.members {
                let record = inner
                    .records
                    .get(id)
                    .expect("group member not live in arena");
                f(id, record);
            }
        }
    }

    /// Apply `f` to the record behind `id`, if it is still live.
    pub fn with_record<T>(&self, id: RecordId, f: impl FnOnce(&FileRecord) -> T) -> Option<T> {
        let inner = self.inner.lock().unwrap();
        inner.records.get(id).map(f)
    }

    /// Record the full-content digest for `id`. First write wins; returns
    /// `false` for a dropped write or a dead id.
    pub fn set_checksum(&self, id: RecordId, digest: Checksum) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .get_mut(id)
            .is_some_and(|r| r.set_checksum(digest))
    }

    /// Record a partial-content fingerprint for `id`. First write wins.
    pub fn set_fingerprint(&self, id: RecordId, slot: usize, digest: Checksum) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .get_mut(id)
            .is_some_and(|r| r.set_fingerprint(slot, digest))
    }

    /// Record the middle-of-file sample for `id`. First write wins.
    pub fn set_middle_bytes(&self, id: RecordId, bytes: [u8; MIDDLE_BYTES_LEN]) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner
            .records
            .get_mut(id)
            .is_some_and(|r| r.set_middle_bytes(bytes))
    }

    /// Advance the hashing cursor of `id` to `cursor`.
    pub fn set_hash_cursor(&self, id: RecordId, cursor: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.records.get_mut(id) {
            Some(record) => {
                record.hash_cursor = cursor;
                true
            }
            None => false,
        }
    }

    /// Re-sort one group with a caller-supplied comparator.
    ///
    /// Returns `false` when no group is keyed by `size`.
    pub fn sort_group(
        &self,
        size: u64,
        mut cmp: impl FnMut(&FileRecord, &FileRecord) -> std::cmp::Ordering,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(&idx) = inner.by_size.get(&size) else {
            return false;
        };
        let StoreInner {
            records, groups, ..
        } = &mut *inner;
        groups[idx].members.sort_by(|&a, &b| {
            cmp(
                records.get(a).expect("group member not live in arena"),
                records.get(b).expect("group member not live in arena"),
            )
        });
        true
    }

    /// The combined pass run once discovery completes: sort groups
    /// ascending by size, then per group of two or more members sort by
    /// `(device, inode, basename)`, resolve same-file aliases, and apply
    /// the admission filter. Rejected groups are cleared entirely.
    ///
    /// Rejection is normal control flow, never an error: a group with fewer
    /// than two survivors, or with no eligible non-original to delete, is
    /// not actionable downstream and hashing it would be wasted I/O.
    pub fn sort_and_filter(
        &self,
        settings: &Settings,
        criteria: &dyn OriginalCriteria,
    ) -> PruneStats {
        self.inner.lock().unwrap().sort_and_filter(settings, criteria)
    }

    /// Write the diagnostic listing: one `offset:size:device:inode:path`
    /// line per record, groups separated by `----`.
    pub fn dump(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        self.inner.lock().unwrap().dump(writer)
    }

    /// Hand the surviving records to the device offset indexer.
    ///
    /// Consumes the store: groups are discarded, records survive inside the
    /// returned index, partitioned per device and ordered ascending by
    /// physical offset (refreshed through `lookup`).
    #[must_use]
    pub fn into_device_index(self, lookup: &dyn OffsetLookup) -> DeviceIndex {
        let inner = self.inner.into_inner().unwrap();
        let ordered = inner.snapshot_ids();
        let mut index = DeviceIndex::build(inner.records, &ordered);
        index.resort_all(true, true, lookup);
        index
    }
}
