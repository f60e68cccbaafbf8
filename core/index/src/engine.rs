//! Per-vault blind attribute index.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::diff::IndexDiff;
use edvault_common::{Document, DocumentId, Error, Query, Result};

/// One indexed `(attribute, value)` pair of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexEntry {
    /// Blinded attribute name.
    pub attribute: String,
    /// Blinded attribute value.
    pub value: String,
    pub unique: bool,
}

/// Declaration made by `ensure_index`.
#[derive(Debug, Clone, Copy, Default)]
struct AttributeSpec {
    unique: bool,
}

/// Blind-value index for the documents of one vault.
#[derive(Debug, Default)]
pub struct IndexEngine {
    /// Attributes that documents written from now on get indexed under.
    ensured: HashMap<String, AttributeSpec>,
    /// attribute -> value -> documents, for `equals`.
    by_value: HashMap<String, HashMap<String, BTreeSet<DocumentId>>>,
    /// attribute -> documents, for `has`.
    by_attribute: HashMap<String, BTreeSet<DocumentId>>,
    /// Entries recorded per document, used to unlink it later.
    entries: HashMap<DocumentId, Vec<IndexEntry>>,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute so that subsequently written documents carrying
    /// it are indexed under it.
    ///
    /// Already stored documents are not rescanned. Ensuring an attribute
    /// twice keeps it unique if either call asked for uniqueness.
    pub fn ensure_index(&mut self, attribute: impl Into<String>, unique: bool) {
        let attribute = attribute.into();
        debug!(attribute = %attribute, unique, "Ensuring index");
        let spec = self.ensured.entry(attribute).or_default();
        spec.unique |= unique;
    }

    pub fn is_ensured(&self, attribute: &str) -> bool {
        self.ensured.contains_key(attribute)
    }

    /// Drop attribute records of `doc` that no ensured attribute covers.
    ///
    /// Entry sets themselves are kept even when they end up empty.
    pub fn prune(&self, doc: &mut Document) {
        for set in &mut doc.indexed {
            set.attributes.retain(|attr| self.is_ensured(&attr.name));
        }
    }

    /// Compute the index entries `doc` would be recorded under.
    pub fn entries_for(&self, doc: &Document) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = doc
            .attributes()
            .filter_map(|attr| {
                self.ensured.get(&attr.name).map(|spec| IndexEntry {
                    attribute: attr.name.clone(),
                    value: attr.value.clone(),
                    unique: attr.unique || spec.unique,
                })
            })
            .collect();
        entries.sort();
        entries.dedup_by(|later, kept| {
            let same = later.attribute == kept.attribute && later.value == kept.value;
            if same {
                kept.unique |= later.unique;
            }
            same
        });
        entries
    }

    /// Entries currently recorded for a document.
    pub fn recorded(&self, id: &DocumentId) -> &[IndexEntry] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fail if any unique entry is already held by a different document.
    fn check_unique<'a>(
        &self,
        id: &DocumentId,
        entries: impl IntoIterator<Item = &'a IndexEntry>,
    ) -> Result<()> {
        for entry in entries.into_iter().filter(|e| e.unique) {
            let holders = self
                .by_value
                .get(&entry.attribute)
                .and_then(|values| values.get(&entry.value));
            if let Some(holders) = holders {
                if holders.iter().any(|holder| holder != id) {
                    return Err(Error::Duplicate(format!(
                        "Unique attribute already indexed for another document: {}",
                        entry.attribute
                    )));
                }
            }
        }
        Ok(())
    }

    fn link(&mut self, id: &DocumentId, entry: &IndexEntry) {
        self.by_value
            .entry(entry.attribute.clone())
            .or_default()
            .entry(entry.value.clone())
            .or_default()
            .insert(id.clone());
        self.by_attribute
            .entry(entry.attribute.clone())
            .or_default()
            .insert(id.clone());
    }

    fn unlink(&mut self, id: &DocumentId, entry: &IndexEntry, remaining: &[IndexEntry]) {
        if let Some(values) = self.by_value.get_mut(&entry.attribute) {
            if let Some(ids) = values.get_mut(&entry.value) {
                ids.remove(id);
                if ids.is_empty() {
                    values.remove(&entry.value);
                }
            }
            if values.is_empty() {
                self.by_value.remove(&entry.attribute);
            }
        }

        // The document may still carry the attribute under another value.
        if remaining.iter().any(|e| e.attribute == entry.attribute) {
            return;
        }
        if let Some(ids) = self.by_attribute.get_mut(&entry.attribute) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_attribute.remove(&entry.attribute);
            }
        }
    }

    /// Record index entries for a newly stored document.
    ///
    /// # Errors
    /// - `Error::Duplicate` if a unique entry is held by another document;
    ///   the index is left unchanged
    pub fn index_document(&mut self, doc: &Document) -> Result<()> {
        let entries = self.entries_for(doc);
        self.check_unique(&doc.id, &entries)?;

        for entry in &entries {
            self.link(&doc.id, entry);
        }
        debug!(document = %doc.id, entries = entries.len(), "Indexed document");
        self.entries.insert(doc.id.clone(), entries);
        Ok(())
    }

    /// Remove every index entry of a document.
    ///
    /// Returns whether the document had been indexed at all.
    pub fn remove_document(&mut self, id: &DocumentId) -> bool {
        let Some(entries) = self.entries.remove(id) else {
            return false;
        };
        for entry in &entries {
            self.unlink(id, entry, &[]);
        }
        debug!(document = %id, entries = entries.len(), "Removed document from index");
        true
    }

    /// Replace the entries of `old` with those of `new` in one step.
    ///
    /// # Errors
    /// - `Error::Duplicate` if an added unique entry is held by another
    ///   document; the index is left unchanged
    pub fn reindex_document(&mut self, old: &Document, new: &Document) -> Result<IndexDiff> {
        let next = self.entries_for(new);
        let diff = IndexDiff::compute(self.recorded(&old.id), &next);
        self.check_unique(&new.id, diff.added())?;

        let retained = diff.retained();
        for entry in diff.removed() {
            self.unlink(&old.id, entry, &retained);
        }
        for entry in diff.added() {
            self.link(&new.id, entry);
        }
        self.entries.insert(new.id.clone(), retained);

        debug!(
            document = %new.id,
            added = diff.added().count(),
            removed = diff.removed().count(),
            "Reindexed document"
        );
        Ok(diff)
    }

    /// Evaluate a query, returning the ids of all matching documents.
    ///
    /// An empty query matches nothing. A term on an attribute that was never
    /// indexed matches nothing, which empties the whole intersection.
    pub fn query(&self, query: &Query) -> BTreeSet<DocumentId> {
        if query.is_empty() {
            return BTreeSet::new();
        }

        let empty = BTreeSet::new();
        let mut terms: Vec<&BTreeSet<DocumentId>> = Vec::new();

        for attribute in &query.has {
            terms.push(self.by_attribute.get(attribute).unwrap_or(&empty));
        }
        for (attribute, value) in query.equality_pairs() {
            let ids = self
                .by_value
                .get(attribute)
                .and_then(|values| values.get(value))
                .unwrap_or(&empty);
            terms.push(ids);
        }

        terms.sort_by_key(|ids| ids.len());
        let Some((first, rest)) = terms.split_first() else {
            return BTreeSet::new();
        };

        first
            .iter()
            .filter(|id| rest.iter().all(|ids| ids.contains(*id)))
            .cloned()
            .collect()
    }
}
