//! File records and the arena that owns them.
//!
//! # Overview
//!
//! A [`FileRecord`] is one discovered filesystem path: immutable identity
//! (path, size, device, inode) plus the mutable scan state the later
//! pipeline stages fill in (physical offset, hash cursor, digest slots,
//! hardlink link). Records live in a [`RecordArena`] and are referred to by
//! [`RecordId`], a stable index that stays valid for the lifetime of a scan.
//!
//! The arena never reuses a slot after removal, so a dangling `RecordId`
//! (e.g. a `hardlink_of` link whose target was later removed) resolves to
//! `None` instead of aliasing an unrelated record.

use std::ffi::OsStr;
use std::path::PathBuf;

use serde::Serialize;

/// Length in bytes of a content digest slot.
pub const CHECKSUM_LEN: usize = 32;

/// Number of partial-content fingerprint slots per record (head and tail).
pub const FINGERPRINT_SLOTS: usize = 2;

/// Length in bytes of the raw sample taken from the middle of a file.
pub const MIDDLE_BYTES_LEN: usize = 16;

/// A fixed-size content digest, as produced by the hashing stage.
pub type Checksum = [u8; CHECKSUM_LEN];

/// Stable handle to a [`FileRecord`] inside a [`RecordArena`].
///
/// Ids are plain indices; they are never reused within one scan, so a
/// stale id can dangle but never alias a different record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(u32);

impl RecordId {
    /// The raw index value, for diagnostics.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata and scan state for one discovered file.
///
/// Identity fields are set at construction and never change. The digest
/// slots and the hardlink link follow write-once discipline: the first
/// write sticks, later writes are no-ops. This makes concurrent reads after
/// the resolution pass safe without further locking.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Inode number on its device.
    pub inode: u64,
    /// Device identifier the file lives on.
    pub device: u64,
    /// Inode of the containing directory, captured at discovery time.
    /// Used to recognize the same directory entry reached twice.
    pub parent_inode: u64,
    /// Physical byte location on the device, refreshed lazily by the
    /// device offset indexer. Meaningless until the first refresh.
    pub physical_offset: u64,
    /// Byte offset hashed so far; the next hashing round resumes here.
    pub hash_cursor: u64,
    /// Whether the file lies under a scan root flagged as authoritative.
    pub in_preferred_path: bool,
    checksum: Option<Checksum>,
    fingerprints: [Option<Checksum>; FINGERPRINT_SLOTS],
    middle_bytes: Option<[u8; MIDDLE_BYTES_LEN]>,
    hardlink_of: Option<RecordId>,
}

impl FileRecord {
    /// Create a record from identity fields supplied by the discovery stage.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        inode: u64,
        device: u64,
        parent_inode: u64,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            inode,
            device,
            parent_inode,
            physical_offset: 0,
            hash_cursor: 0,
            in_preferred_path: false,
            checksum: None,
            fingerprints: [None; FINGERPRINT_SLOTS],
            middle_bytes: None,
            hardlink_of: None,
        }
    }

    /// Mark the record as lying under a preferred (authoritative) scan root.
    #[must_use]
    pub fn with_preferred(mut self, preferred: bool) -> Self {
        self.in_preferred_path = preferred;
        self
    }

    /// Build a record from `std::fs::Metadata`.
    ///
    /// The parent-directory inode cannot be derived from the file's own
    /// metadata, so the discovery stage passes it in alongside.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(
        path: impl Into<PathBuf>,
        metadata: &std::fs::Metadata,
        parent_inode: u64,
    ) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::new(
            path,
            metadata.len(),
            metadata.ino(),
            metadata.dev(),
            parent_inode,
        )
    }

    /// Final path component, falling back to the whole path for inputs
    /// like `/` or `..` that have no file name.
    #[must_use]
    pub fn basename(&self) -> &OsStr {
        self.path.file_name().unwrap_or_else(|| self.path.as_os_str())
    }

    /// Record the full-content digest. Returns `false` if a digest was
    /// already present (the write is dropped).
    pub fn set_checksum(&mut self, digest: Checksum) -> bool {
        if self.checksum.is_some() {
            return false;
        }
        self.checksum = Some(digest);
        true
    }

    /// The full-content digest, if the hashing stage has produced one.
    #[must_use]
    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    /// Record a partial-content fingerprint.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= FINGERPRINT_SLOTS`; slot indices are fixed by the
    /// hashing stage and an out-of-range index is a programming error.
    pub fn set_fingerprint(&mut self, slot: usize, digest: Checksum) -> bool {
        assert!(slot < FINGERPRINT_SLOTS, "fingerprint slot {slot} out of range");
        if self.fingerprints[slot].is_some() {
            return false;
        }
        self.fingerprints[slot] = Some(digest);
        true
    }

    /// A previously recorded fingerprint, if any.
    #[must_use]
    pub fn fingerprint(&self, slot: usize) -> Option<&Checksum> {
        self.fingerprints.get(slot).and_then(Option::as_ref)
    }

    /// Record the raw middle-of-file sample.
    pub fn set_middle_bytes(&mut self, bytes: [u8; MIDDLE_BYTES_LEN]) -> bool {
        if self.middle_bytes.is_some() {
            return false;
        }
        self.middle_bytes = Some(bytes);
        true
    }

    /// The raw middle-of-file sample, if recorded.
    #[must_use]
    pub fn middle_bytes(&self) -> Option<&[u8; MIDDLE_BYTES_LEN]> {
        self.middle_bytes.as_ref()
    }

    /// The earliest-seen record this one is a hardlink of, if any.
    ///
    /// Set during alias resolution; once set it is never reassigned, and
    /// following the link never cycles.
    #[must_use]
    pub fn hardlink_of(&self) -> Option<RecordId> {
        self.hardlink_of
    }

    /// Link this record to its hardlink original. First write wins.
    pub(crate) fn set_hardlink_of(&mut self, original: RecordId) -> bool {
        if self.hardlink_of.is_some() {
            return false;
        }
        self.hardlink_of = Some(original);
        true
    }

    /// Whether this record denotes the same physical file as `other`.
    #[must_use]
    pub fn same_inode(&self, other: &FileRecord) -> bool {
        self.device == other.device && self.inode == other.inode
    }
}

/// Arena owning every live [`FileRecord`] of a scan.
///
/// Removal tombstones the slot; slots are never reused, so ids handed out
/// earlier stay unambiguous. Memory for tombstones is reclaimed when the
/// arena is dropped at the end of the scan.
#[derive(Debug, Default)]
pub struct RecordArena {
    slots: Vec<Option<FileRecord>>,
    live: usize,
}

impl RecordArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an arena with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Take ownership of a record, returning its stable id.
    pub fn insert(&mut self, record: FileRecord) -> RecordId {
        let id = RecordId(u32::try_from(self.slots.len()).expect("record count exceeds u32"));
        self.slots.push(Some(record));
        self.live += 1;
        id
    }

    /// Borrow a live record. `None` for removed or unknown ids.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&FileRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutably borrow a live record.
    #[must_use]
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut FileRecord> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Destroy a record, leaving a tombstone. Returns the record, or `None`
    /// if the id was already dead.
    pub fn remove(&mut self, id: RecordId) -> Option<FileRecord> {
        let record = self.slots.get_mut(id.index()).and_then(Option::take);
        if record.is_some() {
            self.live -= 1;
        }
        record
    }

    /// Whether the id refers to a live record.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no live records remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Follow a record's hardlink chain to the earliest-seen original.
    ///
    /// Returns `id` itself when the record carries no link. Tolerates a
    /// removed link target by stopping at the last live record.
    #[must_use]
    pub fn hardlink_original(&self, id: RecordId) -> RecordId {
        let mut current = id;
        while let Some(next) = self.get(current).and_then(FileRecord::hardlink_of) {
            if !self.contains(next) {
                break;
            }
            current = next;
        }
        current
    }
}
