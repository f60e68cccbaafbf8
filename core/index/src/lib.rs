//! Blind-value index engine for encrypted documents.
//!
//! The engine only ever sees opaque attribute names and values produced by
//! the client's HMAC blinding. It answers existence (`has`) and equality
//! (`equals`) queries by intersecting per-term document id sets.
//!
//! # Design Principles
//! - Declared attributes only: a document attribute is indexed when its
//!   name was ensured before the document was written
//! - No retroactive indexing: ensuring an attribute never rescans documents
//! - Single-step updates: old and new entries are diffed once and applied
//!   together, so readers never see a document with no entries mid-update
//!
//! The engine holds no lock of its own. The document store keeps one engine
//! per vault inside the same guarded partition as the documents it indexes.

pub mod diff;
pub mod engine;

pub use diff::{EntryChange, IndexDiff};
pub use engine::{IndexEngine, IndexEntry};
