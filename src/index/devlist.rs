//! Per-device record lists ordered by physical offset.
//!
//! # Overview
//!
//! Hashing duplicate candidates in discovery order means random seeks: the
//! candidates of one group are scattered across the platter. The
//! [`DeviceIndex`] re-houses the surviving records into one list per
//! storage device, each ordered by physical byte offset, so the hashing
//! stage reads near-sequentially per device. This is purely a scheduling
//! optimization; it never changes which files are considered duplicates.
//!
//! Offsets come from the [`OffsetLookup`] collaborator (extent tables,
//! block-layer queries) keyed by each record's hash cursor, so a re-sort
//! after hashing has advanced lines the next read burst up again.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::error::OffsetError;
use crate::index::record::{FileRecord, RecordArena, RecordId};

/// Resolves the physical byte location of a file's next unhashed region.
///
/// Implemented by the storage/OS collaborator; tests use table-backed
/// fakes. Lookups should be fast or cached, as they run under the indexing
/// pass.
pub trait OffsetLookup: Send + Sync {
    /// Physical offset of the byte at `cursor` within `record`'s file.
    fn physical_offset(&self, record: &FileRecord, cursor: u64) -> Result<u64, OffsetError>;
}

impl<F> OffsetLookup for F
where
    F: Fn(&FileRecord, u64) -> Result<u64, OffsetError> + Send + Sync,
{
    fn physical_offset(&self, record: &FileRecord, cursor: u64) -> Result<u64, OffsetError> {
        self(record, cursor)
    }
}

/// Surviving records partitioned by device and ordered by physical offset.
///
/// Owns the record arena handed over by the group store, so ids (including
/// hardlink links) keep resolving after the hand-off.
#[derive(Debug)]
pub struct DeviceIndex {
    records: RecordArena,
    by_device: HashMap<u64, Vec<RecordId>>,
}

impl DeviceIndex {
    /// Partition `ordered` (live ids, store iteration order) by device.
    /// Partitions are unordered until the first resort.
    pub(crate) fn build(records: RecordArena, ordered: &[RecordId]) -> Self {
        let mut by_device: HashMap<u64, Vec<RecordId>> = HashMap::new();
        for &id in ordered {
            let record = records.get(id).expect("device index built from dead id");
            by_device.entry(record.device).or_default().push(id);
        }
        log::debug!(
            "Device index: {} records across {} devices",
            ordered.len(),
            by_device.len()
        );
        Self { records, by_device }
    }

    /// Device identifiers present, in ascending order.
    #[must_use]
    pub fn devices(&self) -> Vec<u64> {
        let mut devices: Vec<u64> = self.by_device.keys().copied().collect();
        devices.sort_unstable();
        devices
    }

    /// Record ids on `device`, in the current partition order.
    #[must_use]
    pub fn records_on(&self, device: u64) -> &[RecordId] {
        self.by_device.get(&device).map_or(&[], Vec::as_slice)
    }

    /// Borrow a record by id. `None` once the id is dead.
    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<&FileRecord> {
        self.records.get(id)
    }

    /// Follow a record's hardlink chain to its earliest-seen original.
    #[must_use]
    pub fn hardlink_original(&self, id: RecordId) -> RecordId {
        self.records.hardlink_original(id)
    }

    /// Total records across all devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_device.values().map(Vec::len).sum()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }

    /// Number of device partitions.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.by_device.len()
    }

    /// Iterate over `(device, ids)` partitions in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[RecordId])> {
        self.by_device.iter().map(|(&dev, ids)| (dev, ids.as_slice()))
    }

    /// Re-order one device partition by physical offset.
    ///
    /// With `force_update`, offsets are first refreshed through `lookup` at
    /// each record's current hash cursor; without it, the stale offsets are
    /// reused for a cheap re-sort. `forward` selects ascending order,
    /// descending otherwise. A failed lookup is a per-record soft failure:
    /// the record keeps its last-known offset and is counted in the return
    /// value.
    pub fn resort(
        &mut self,
        device: u64,
        forward: bool,
        force_update: bool,
        lookup: &dyn OffsetLookup,
    ) -> usize {
        let Self { records, by_device } = self;
        let Some(ids) = by_device.get_mut(&device) else {
            return 0;
        };
        let failures = if force_update {
            refresh_offsets(records, ids, lookup)
        } else {
            0
        };
        sort_by_offset(records, ids, forward);
        failures
    }

    /// Re-order every device partition, refreshing offsets in parallel.
    ///
    /// Returns the total number of per-record lookup failures.
    pub fn resort_all(
        &mut self,
        forward: bool,
        force_update: bool,
        lookup: &dyn OffsetLookup,
    ) -> usize {
        let mut failures = 0;
        if force_update {
            let records = &self.records;
            let updates: Vec<(RecordId, Result<u64, OffsetError>)> = self
                .by_device
                .par_iter()
                .flat_map_iter(|(_, ids)| {
                    ids.iter().map(move |&id| {
                        let record = records.get(id).expect("device index holds dead id");
                        (id, lookup.physical_offset(record, record.hash_cursor))
                    })
                })
                .collect();
            for (id, result) in updates {
                failures += apply_offset(&mut self.records, id, result);
            }
        }

        let records = &self.records;
        self.by_device
            .par_iter_mut()
            .for_each(|(_, ids)| sort_by_offset(records, ids, forward));

        failures
    }
}

fn refresh_offsets(
    records: &mut RecordArena,
    ids: &[RecordId],
    lookup: &dyn OffsetLookup,
) -> usize {
    let mut failures = 0;
    for &id in ids {
        let record = records.get(id).expect("device index holds dead id");
        let result = lookup.physical_offset(record, record.hash_cursor);
        failures += apply_offset(records, id, result);
    }
    failures
}

/// Apply one lookup result; returns 1 on soft failure, 0 otherwise.
fn apply_offset(
    records: &mut RecordArena,
    id: RecordId,
    result: Result<u64, OffsetError>,
) -> usize {
    let record = records.get_mut(id).expect("device index holds dead id");
    match result {
        Ok(offset) => {
            record.physical_offset = offset;
            0
        }
        Err(err) => {
            log::warn!(
                "Keeping last-known offset for {}: {}",
                record.path.display(),
                err
            );
            1
        }
    }
}

fn sort_by_offset(records: &RecordArena, ids: &mut [RecordId], forward: bool) {
    // Offsets are u64 and can exceed i64 range; compare, never subtract.
    ids.sort_by(|&a, &b| {
        let fa = records.get(a).expect("device index holds dead id");
        let fb = records.get(b).expect("device index holds dead id");
        let ord = fa.physical_offset.cmp(&fb.physical_offset);
        if forward {
            ord
        } else {
            ord.reverse()
        }
    });
}
