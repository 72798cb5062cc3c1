//! dupe-index - Duplicate-Candidate File Index
//!
//! The in-memory core of a filesystem deduplication scanner: a concurrent,
//! size-partitioned registry of discovered files. It groups files by byte
//! size, collapses same-file aliases (duplicate paths, traversal loops) and
//! links hardlinks before any content hashing happens, prunes groups that
//! cannot yield an actionable duplicate set under policy, and re-orders the
//! survivors by on-disk physical location so the hashing stage reads
//! near-sequentially per storage device.
//!
//! Discovery, hashing, extent lookup, and report output are external
//! collaborators; this crate only stages and orders their work.

pub mod config;
pub mod error;
pub mod index;
pub mod logging;

pub use config::Settings;
pub use error::OffsetError;
