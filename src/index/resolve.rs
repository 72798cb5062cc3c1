//! Same-file alias resolution within a size group.
//!
//! # Overview
//!
//! With multiple scan roots or a filesystem loop, several records may point
//! to the same physical file. Treating those as duplicates of each other is
//! dangerous: the "duplicate" that gets deleted later could be the original.
//! This module walks a group sorted by `(device, inode, basename)` pairwise
//! and, for each dev/inode collision, either collapses a path alias to one
//! record or links a genuine hardlink pair so the hashing stage can skip
//! redundant work.
//!
//! Resolution is only defined on a sorted group; [`resolve_aliases`] is
//! called exclusively from the store's combined sort-and-filter pass, which
//! establishes the order first.

use std::cmp::Ordering;

use crate::config::Settings;
use crate::index::record::{FileRecord, RecordArena, RecordId};

/// Ranks two records competing to be kept as the original.
///
/// `Ordering::Less` means the first record outranks the second and must be
/// kept. A result of `Equal` or `Greater` marks the first record as the
/// loser of an alias collision.
pub trait OriginalCriteria: Send + Sync {
    /// Compare two records for original-ness.
    fn cmp_originals(&self, a: &FileRecord, b: &FileRecord) -> Ordering;
}

impl<F> OriginalCriteria for F
where
    F: Fn(&FileRecord, &FileRecord) -> Ordering + Send + Sync,
{
    fn cmp_originals(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        self(a, b)
    }
}

/// Default criteria: preferred-path records outrank non-preferred ones;
/// otherwise the two are considered equal and pair order decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferredPathCriteria;

impl OriginalCriteria for PreferredPathCriteria {
    fn cmp_originals(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        b.in_preferred_path.cmp(&a.in_preferred_path)
    }
}

/// The total order alias resolution requires: device, then inode, then
/// basename. Two records for the same physical file always end up adjacent.
pub(crate) fn cmp_identity(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.device
        .cmp(&b.device)
        .then_with(|| a.inode.cmp(&b.inode))
        .then_with(|| a.basename().cmp(b.basename()))
}

/// Whether a dev/inode collision is a path alias rather than a hardlink.
///
/// A collision collapses to one record when hardlink-aware dedup is off, or
/// when both paths carry the same basename *and* the same parent-directory
/// inode: that signature means the same directory entry was reached twice
/// (multiple scan roots, symlink loop). Assumption: the signature is taken
/// as-is for bind mounts and union filesystems, where it may mislabel.
pub(crate) fn is_path_alias(settings: &Settings, a: &FileRecord, b: &FileRecord) -> bool {
    !settings.find_hardlinked_dupes
        || (a.basename() == b.basename() && a.parent_inode == b.parent_inode)
}

/// Count preferred- vs non-preferred-path members of a group.
pub(crate) fn count_preferred(records: &RecordArena, members: &[RecordId]) -> (usize, usize) {
    let mut num_pref = 0;
    let mut num_nonpref = 0;
    for &id in members {
        let record = records.get(id).expect("group member not live in arena");
        if record.in_preferred_path {
            num_pref += 1;
        } else {
            num_nonpref += 1;
        }
    }
    (num_pref, num_nonpref)
}

enum PairAction {
    Advance,
    RemoveFirst,
    RemoveSecond,
    Link(RecordId),
}

/// Remove path aliases and link hardlink pairs in a sorted group.
///
/// `members` must already be ordered by [`cmp_identity`]. For each adjacent
/// dev/inode collision:
///
/// - a path alias keeps exactly one record: the one that strictly outranks
///   the other under `criteria` (a non-strict result removes the first of
///   the pair, matching the collaborating deleter's notion of "original");
/// - a hardlink pair keeps both and points the later record's link at the
///   earliest-seen original, chaining transitively.
///
/// Returns the number of records removed. Running it again on the already
/// resolved group removes nothing.
pub(crate) fn resolve_aliases(
    records: &mut RecordArena,
    members: &mut Vec<RecordId>,
    settings: &Settings,
    criteria: &dyn OriginalCriteria,
) -> usize {
    debug_assert!(
        members.windows(2).all(|w| {
            let (a, b) = (records.get(w[0]), records.get(w[1]));
            matches!((a, b), (Some(a), Some(b)) if cmp_identity(a, b) != Ordering::Greater)
        }),
        "alias resolution invoked on an unsorted group"
    );

    let mut removed = 0;
    let mut i = 0;
    while i + 1 < members.len() {
        let (a_id, b_id) = (members[i], members[i + 1]);
        let action = {
            let a = records.get(a_id).expect("group member not live in arena");
            let b = records.get(b_id).expect("group member not live in arena");
            if !a.same_inode(b) {
                PairAction::Advance
            } else if is_path_alias(settings, a, b) {
                if criteria.cmp_originals(a, b) == Ordering::Less {
                    PairAction::RemoveSecond
                } else {
                    PairAction::RemoveFirst
                }
            } else {
                PairAction::Link(a.hardlink_of().unwrap_or(a_id))
            }
        };

        match action {
            PairAction::Advance => i += 1,
            PairAction::RemoveFirst => {
                members.remove(i);
                records.remove(a_id);
                removed += 1;
                // The cursor now sits on the kept record; the next round
                // compares it against its new neighbor.
            }
            PairAction::RemoveSecond => {
                members.remove(i + 1);
                records.remove(b_id);
                removed += 1;
            }
            PairAction::Link(original) => {
                let later = records.get_mut(b_id).expect("group member not live in arena");
                later.set_hardlink_of(original);
                log::trace!(
                    "Hardlink: {} -> original {}",
                    later.path.display(),
                    original
                );
                i += 1;
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(path: &str, device: u64, inode: u64, parent: u64) -> FileRecord {
        FileRecord::new(path, 100, inode, device, parent)
    }

    fn sorted_ids(records: &mut RecordArena, recs: Vec<FileRecord>) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = recs.into_iter().map(|r| records.insert(r)).collect();
        ids.sort_by(|&a, &b| cmp_identity(records.get(a).unwrap(), records.get(b).unwrap()));
        ids
    }

    #[test]
    fn identity_order_is_device_inode_basename() {
        let a = make("/x/b", 1, 5, 1);
        let b = make("/y/a", 1, 5, 2);
        let c = make("/z/a", 1, 6, 3);
        let d = make("/w/a", 2, 1, 4);

        assert_eq!(cmp_identity(&b, &a), Ordering::Less); // basename tiebreak
        assert_eq!(cmp_identity(&a, &c), Ordering::Less); // inode before basename
        assert_eq!(cmp_identity(&c, &d), Ordering::Less); // device first
    }

    #[test]
    fn same_directory_entry_twice_is_alias() {
        let settings = Settings::default();
        let a = make("/root1/f", 1, 5, 10);
        let b = make("/root2/f", 1, 5, 10);
        assert!(is_path_alias(&settings, &a, &b));
    }

    #[test]
    fn different_parent_is_hardlink_when_enabled() {
        let settings = Settings::default();
        let a = make("/x/f", 1, 5, 10);
        let b = make("/y/f", 1, 5, 11);
        assert!(!is_path_alias(&settings, &a, &b));
    }

    #[test]
    fn hardlink_dedup_disabled_makes_every_collision_an_alias() {
        let settings = Settings::default().with_find_hardlinked_dupes(false);
        let a = make("/x/f", 1, 5, 10);
        let b = make("/y/g", 1, 5, 11);
        assert!(is_path_alias(&settings, &a, &b));
    }

    #[test]
    fn alias_pair_collapses_to_one() {
        let mut records = RecordArena::new();
        let settings = Settings::default();
        let mut members = sorted_ids(
            &mut records,
            vec![make("/a/f", 1, 5, 9), make("/b/f", 1, 5, 9)],
        );

        let removed = resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert_eq!(removed, 1);
        assert_eq!(members.len(), 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn preferred_record_survives_alias_collapse() {
        let mut records = RecordArena::new();
        let settings = Settings::default().with_find_hardlinked_dupes(false);
        let preferred = make("/a/f", 1, 5, 9).with_preferred(true);
        let other = make("/b/g", 1, 5, 8);
        let mut members = sorted_ids(&mut records, vec![preferred, other]);

        resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert_eq!(members.len(), 1);
        let survivor = records.get(members[0]).unwrap();
        assert!(survivor.in_preferred_path);
    }

    #[test]
    fn hardlink_pair_links_later_to_earlier() {
        let mut records = RecordArena::new();
        let settings = Settings::default();
        let mut members = sorted_ids(
            &mut records,
            vec![make("/x/a", 1, 5, 10), make("/y/b", 1, 5, 11)],
        );

        let removed = resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert_eq!(removed, 0);
        assert_eq!(members.len(), 2);

        let earlier = members[0];
        let later = records.get(members[1]).unwrap();
        assert_eq!(later.hardlink_of(), Some(earlier));
        assert_eq!(records.get(earlier).unwrap().hardlink_of(), None);
    }

    #[test]
    fn hardlink_chain_points_at_earliest_original() {
        let mut records = RecordArena::new();
        let settings = Settings::default();
        let mut members = sorted_ids(
            &mut records,
            vec![
                make("/x/a", 1, 5, 10),
                make("/y/b", 1, 5, 11),
                make("/z/c", 1, 5, 12),
            ],
        );

        resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);

        let first = members[0];
        // Every later member links straight to the earliest record, not to
        // its left neighbor.
        for &id in &members[1..] {
            assert_eq!(records.get(id).unwrap().hardlink_of(), Some(first));
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut records = RecordArena::new();
        let settings = Settings::default();
        let mut members = sorted_ids(
            &mut records,
            vec![
                make("/a/f", 1, 5, 9),
                make("/b/f", 1, 5, 9),
                make("/c/g", 1, 5, 7),
                make("/d/h", 2, 5, 6),
            ],
        );

        let first_pass =
            resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert!(first_pass >= 1);
        let second_pass =
            resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert_eq!(second_pass, 0);
    }

    #[test]
    fn distinct_inodes_are_untouched() {
        let mut records = RecordArena::new();
        let settings = Settings::default();
        let mut members = sorted_ids(
            &mut records,
            vec![make("/x/f", 1, 5, 10), make("/y/f", 1, 7, 11)],
        );

        let removed = resolve_aliases(&mut records, &mut members, &settings, &PreferredPathCriteria);
        assert_eq!(removed, 0);
        assert_eq!(members.len(), 2);
        assert!(members
            .iter()
            .all(|&id| records.get(id).unwrap().hardlink_of().is_none()));
    }
}
