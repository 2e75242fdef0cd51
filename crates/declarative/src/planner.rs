//! Plan building - selects which entries take part in a pass

use crate::entry::TargetEntry;
use crate::types::EntryTypeSet;
use system::PatternSet;

/// The ordered entries a pass will converge
#[derive(Debug, Clone, Default)]
pub struct ApplyPlan {
    /// Entries in application order; parents precede children
    pub entries: Vec<TargetEntry>,
}

impl ApplyPlan {
    /// Create a plan over every entry, unfiltered
    pub fn new(entries: Vec<TargetEntry>) -> Self {
        Self { entries }
    }

    /// Select entries matching `patterns` and `types`.
    ///
    /// With no `targets` every matching entry is selected. Otherwise an entry
    /// must equal one of the targets, or lie below one when `recursive` is set.
    pub fn select(
        entries: Vec<TargetEntry>,
        patterns: &PatternSet,
        types: &EntryTypeSet,
        targets: &[String],
        recursive: bool,
    ) -> Self {
        Self::new(entries).filter(|entry| {
            patterns.matches(&entry.path)
                && types.contains(entry.entry_type())
                && matches_targets(entry, targets, recursive)
        })
    }

    /// Filter plan to only include entries matching a predicate
    #[must_use]
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&TargetEntry) -> bool,
    {
        Self {
            entries: self.entries.into_iter().filter(|e| predicate(e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn matches_targets(entry: &TargetEntry, targets: &[String], recursive: bool) -> bool {
    if targets.is_empty() {
        return true;
    }
    targets.iter().any(|target| {
        if recursive {
            entry.is_under(target)
        } else {
            entry.path == target.trim_end_matches('/')
        }
    })
}
