//! Per-document sequence bookkeeping.
//!
//! The ledger is the optimistic concurrency primitive: every accepted write
//! either creates a document at sequence 0 or advances it by exactly one.

use std::collections::HashMap;

use edvault_common::{DocumentId, Error, Result};

/// Which entry point a write came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Strict insert: the id must be new.
    Insert,
    /// Update, or insert when no prior document exists.
    Upsert,
}

/// The state change a write will make once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No prior document; it is created at sequence 0.
    Create,
    /// Prior document at `from` moves to `to` (`from + 1`).
    Advance { from: u64, to: u64 },
}

impl Transition {
    /// Sequence the document will be stored at.
    pub fn sequence(&self) -> u64 {
        match self {
            Transition::Create => 0,
            Transition::Advance { to, .. } => *to,
        }
    }
}

/// Current sequence of every document in one vault.
#[derive(Debug, Default)]
pub struct SequenceLedger {
    sequences: HashMap<DocumentId, u64>,
}

impl SequenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_sequence(&self, id: &DocumentId) -> Option<u64> {
        self.sequences.get(id).copied()
    }

    /// Decide how a write of `id` carrying `submitted` should proceed.
    ///
    /// Both insert and upsert go through here so the sequence rules live in
    /// one place. An upsert of an unknown id ignores `submitted`.
    ///
    /// # Errors
    /// - `Error::Duplicate` on insert of a known id
    /// - `Error::Validation` on insert with a non-zero sequence
    /// - `Error::InvalidState` on update whose sequence is not current + 1
    pub fn transition(&self, id: &DocumentId, mode: WriteMode, submitted: u64) -> Result<Transition> {
        match (mode, self.current_sequence(id)) {
            (WriteMode::Insert, Some(_)) => Err(Error::Duplicate(format!(
                "Document already exists: {id}"
            ))),
            (WriteMode::Insert, None) if submitted != 0 => Err(Error::Validation(format!(
                "New document must have sequence 0, got {submitted}"
            ))),
            (_, None) => Ok(Transition::Create),
            (WriteMode::Upsert, Some(current)) => {
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| Error::InvalidState(format!("Sequence exhausted for {id}")))?;
                if submitted != next {
                    return Err(Error::InvalidState(format!(
                        "Sequence mismatch for {id}: expected {next}, got {submitted}"
                    )));
                }
                Ok(Transition::Advance {
                    from: current,
                    to: next,
                })
            }
        }
    }

    /// Start tracking a new document at sequence 0.
    pub fn register(&mut self, id: &DocumentId) -> Result<u64> {
        if self.sequences.contains_key(id) {
            return Err(Error::Duplicate(format!("Document already exists: {id}")));
        }
        self.sequences.insert(id.clone(), 0);
        Ok(0)
    }

    /// Compare-and-advance: move `id` from `expected_current` to the next
    /// sequence.
    ///
    /// # Errors
    /// - `Error::InvalidState` if the ledger holds a different sequence or
    ///   none at all
    pub fn advance(&mut self, id: &DocumentId, expected_current: u64) -> Result<u64> {
        let current = self
            .sequences
            .get_mut(id)
            .ok_or_else(|| Error::InvalidState(format!("No sequence recorded for {id}")))?;
        if *current != expected_current {
            return Err(Error::InvalidState(format!(
                "Sequence mismatch for {id}: current {current}, expected {expected_current}"
            )));
        }
        *current += 1;
        Ok(*current)
    }

    /// Apply a transition produced by [`Self::transition`].
    pub fn apply(&mut self, id: &DocumentId, transition: Transition) -> Result<u64> {
        match transition {
            Transition::Create => self.register(id),
            Transition::Advance { from, .. } => self.advance(id, from),
        }
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<u64> {
        self.sequences.remove(id)
    }
}
