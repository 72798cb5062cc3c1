//! Scan policy settings.
//!
//! [`Settings`] is the policy object the index core consumes. It is plain
//! data with serde derives so an embedding application can layer it from a
//! config file or environment; loading itself happens outside this crate.

use serde::{Deserialize, Serialize};

/// Policy flags controlling alias resolution and group admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Treat multiple directory entries of one inode as a legitimate
    /// duplicate set. When false, every dev/inode collision collapses to a
    /// single record.
    #[serde(default = "default_true")]
    pub find_hardlinked_dupes: bool,

    /// Reject groups that contain no preferred-path member: a duplicate set
    /// without an original to match against is not actionable.
    #[serde(default)]
    pub must_match_original: bool,

    /// Preferred-path members are untouchable; reject groups where every
    /// member is preferred, since nothing is left to deduplicate.
    #[serde(default)]
    pub keep_all_originals: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            find_hardlinked_dupes: true,
            must_match_original: false,
            keep_all_originals: false,
        }
    }
}

impl Settings {
    /// Set whether hardlinked duplicates are kept as a set.
    #[must_use]
    pub fn with_find_hardlinked_dupes(mut self, value: bool) -> Self {
        self.find_hardlinked_dupes = value;
        self
    }

    /// Set whether groups must contain a preferred-path member.
    #[must_use]
    pub fn with_must_match_original(mut self, value: bool) -> Self {
        self.must_match_original = value;
        self
    }

    /// Set whether preferred-path members are kept untouched.
    #[must_use]
    pub fn with_keep_all_originals(mut self, value: bool) -> Self {
        self.keep_all_originals = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_hardlink_sets() {
        let settings = Settings::default();
        assert!(settings.find_hardlinked_dupes);
        assert!(!settings.must_match_original);
        assert!(!settings.keep_all_originals);
    }

    #[test]
    fn builder_setters() {
        let settings = Settings::default()
            .with_find_hardlinked_dupes(false)
            .with_must_match_original(true)
            .with_keep_all_originals(true);

        assert!(!settings.find_hardlinked_dupes);
        assert!(settings.must_match_original);
        assert!(settings.keep_all_originals);
    }
}
