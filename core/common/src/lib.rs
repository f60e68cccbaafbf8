//! Common utilities and types shared across the EDV service crates.
//!
//! This module provides the error taxonomy, the identifier encoding and the
//! wire data model for encrypted documents and queries. Nothing in here
//! decrypts anything: content and index values are opaque to the server.

pub mod document;
pub mod error;
pub mod query;
pub mod types;

pub use document::{Chunk, Document, IndexAttribute, IndexEntrySet, KeyReference, NewDocument};
pub use error::{Error, ErrorKind, Result};
pub use query::{Query, QueryResponse};
pub use types::{DocumentId, EdvId};
