//! The duplicate-candidate index.
//!
//! This module is the staging pipeline between discovery and hashing:
//! - [`record`]: file records, stable ids, and the arena that owns them
//! - [`store`]: the size-partitioned group store and its combined
//!   sort/resolve/filter pass
//! - [`resolve`]: same-file alias detection and the original-ranking trait
//! - [`devlist`]: per-device record lists ordered by physical offset
//!
//! # Pipeline
//!
//! ```no_run
//! use dupe_index::config::Settings;
//! use dupe_index::index::{FileRecord, GroupStore, OffsetLookup, PreferredPathCriteria};
//! # use dupe_index::error::OffsetError;
//!
//! let store = GroupStore::new();
//! // Discovery threads insert records as they find files...
//! store.insert(FileRecord::new("/data/a.bin", 4096, 10, 1, 100));
//! store.insert(FileRecord::new("/data/b.bin", 4096, 11, 1, 100));
//!
//! // ...then one pass prunes aliases and hopeless groups...
//! store.sort_and_filter(&Settings::default(), &PreferredPathCriteria);
//!
//! // ...and the survivors are re-housed per device for sequential hashing.
//! # let lookup = |r: &dupe_index::index::FileRecord, _: u64| -> Result<u64, OffsetError> { Ok(0) };
//! let index = store.into_device_index(&lookup);
//! for device in index.devices() {
//!     for &id in index.records_on(device) {
//!         let record = index.record(id).unwrap();
//!         // hand to the hasher in offset order
//!     }
//! }
//! ```

pub mod devlist;
pub mod record;
pub mod resolve;
pub mod store;

pub use devlist::{DeviceIndex, OffsetLookup};
pub use record::{
    Checksum, FileRecord, RecordArena, RecordId, CHECKSUM_LEN, FINGERPRINT_SLOTS, MIDDLE_BYTES_LEN,
};
pub use resolve::{OriginalCriteria, PreferredPathCriteria};
pub use store::{Group, GroupStore, PruneStats};
