//! Error types for the index core.
//!
//! The taxonomy is deliberately narrow: this crate performs no I/O of its
//! own. Invariant violations (removing a record that is not in its claimed
//! group, resolving an unsorted group) are programming errors and surface as
//! panics or debug assertions, not as `Result`s. The only recoverable
//! failure is the external offset-lookup collaborator.

use std::path::PathBuf;

/// Failure of the physical-offset lookup collaborator for one file.
///
/// Treated as a per-file soft failure: the affected record keeps its
/// last-known offset and the indexing pass continues.
#[derive(thiserror::Error, Debug)]
pub enum OffsetError {
    /// The device holding the file could not be queried.
    #[error("Device {device} unreadable for {path}")]
    DeviceUnreadable {
        /// Device identifier that failed.
        device: u64,
        /// Path whose offset was requested.
        path: PathBuf,
    },

    /// The lookup table has no extent covering the requested cursor.
    #[error("No extent at byte {cursor} for {path}")]
    NoExtent {
        /// Byte cursor the lookup was keyed by.
        cursor: u64,
        /// Path whose offset was requested.
        path: PathBuf,
    },

    /// An I/O error occurred while querying the block layer.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path whose offset was requested.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
