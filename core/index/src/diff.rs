//! Index entry diffing between two versions of a document.

use std::collections::BTreeSet;

use crate::engine::IndexEntry;

/// How a single index entry changes across an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    Added(IndexEntry),
    Removed(IndexEntry),
    Unchanged(IndexEntry),
}

/// The full set of entry changes for one document update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDiff {
    changes: Vec<EntryChange>,
}

impl IndexDiff {
    /// Compute the diff from `old` entries to `new` entries.
    pub fn compute(old: &[IndexEntry], new: &[IndexEntry]) -> Self {
        let old: BTreeSet<&IndexEntry> = old.iter().collect();
        let new: BTreeSet<&IndexEntry> = new.iter().collect();

        let mut changes = Vec::with_capacity(old.len().max(new.len()));
        for entry in old.difference(&new) {
            changes.push(EntryChange::Removed((*entry).clone()));
        }
        for entry in old.intersection(&new) {
            changes.push(EntryChange::Unchanged((*entry).clone()));
        }
        for entry in new.difference(&old) {
            changes.push(EntryChange::Added((*entry).clone()));
        }

        Self { changes }
    }

    pub fn changes(&self) -> &[EntryChange] {
        &self.changes
    }

    pub fn added(&self) -> impl Iterator<Item = &IndexEntry> {
        self.changes.iter().filter_map(|c| match c {
            EntryChange::Added(e) => Some(e),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &IndexEntry> {
        self.changes.iter().filter_map(|c| match c {
            EntryChange::Removed(e) => Some(e),
            _ => None,
        })
    }

    /// Entries present after the update (added and unchanged).
    pub fn retained(&self) -> Vec<IndexEntry> {
        self.changes
            .iter()
            .filter_map(|c| match c {
                EntryChange::Added(e) | EntryChange::Unchanged(e) => Some(e.clone()),
                EntryChange::Removed(_) => None,
            })
            .collect()
    }

    /// Whether the update leaves the index untouched.
    pub fn is_noop(&self) -> bool {
        self.changes
            .iter()
            .all(|c| matches!(c, EntryChange::Unchanged(_)))
    }
}
