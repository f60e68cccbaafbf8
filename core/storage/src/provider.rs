//! Document storage trait definition.

use async_trait::async_trait;

use edvault_common::{Chunk, Document, DocumentId, EdvId, KeyReference, Query, Result};

/// Storage backend for encrypted documents, partitioned by vault.
///
/// Callers are expected to have authorized the request already. Every
/// operation on a vault that was never opened fails with `NotFound`.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Get the backend name (e.g., "memory").
    fn name(&self) -> &str;

    /// Create the partition for a vault, or update its index key.
    ///
    /// `hmac` is the index configuration documents get an entry set for
    /// when they arrive without one.
    async fn open_vault(&self, vault: &EdvId, hmac: KeyReference) -> Result<()>;

    /// Declare a blind attribute to index on subsequent writes.
    async fn ensure_index(&self, vault: &EdvId, attribute: &str, unique: bool) -> Result<()>;

    /// Insert a new document.
    ///
    /// # Preconditions
    /// - `doc.sequence` is 0
    ///
    /// # Postconditions
    /// - Document and its index entries are stored together
    /// - Returns the stored document, including its `indexed` entry sets
    ///
    /// # Errors
    /// - `Duplicate` if the id is taken, or a unique attribute collides
    /// - `Validation` if the sequence is not 0
    async fn insert(&self, vault: &EdvId, doc: Document) -> Result<Document>;

    /// Update a document, or insert it if it does not exist.
    ///
    /// # Preconditions
    /// - For an existing document, `doc.sequence` is its current sequence + 1
    ///
    /// # Postconditions
    /// - Content and index entries are replaced in one step
    /// - A newly created document is stored at sequence 0
    ///
    /// # Errors
    /// - `InvalidState` on sequence mismatch
    /// - `Duplicate` if a unique attribute collides
    async fn update(&self, vault: &EdvId, doc: Document) -> Result<Document>;

    /// Fetch a document.
    ///
    /// # Errors
    /// - `NotFound` if no such document exists
    async fn get(&self, vault: &EdvId, id: &DocumentId) -> Result<Document>;

    /// Remove a document, its index entries and its chunks.
    ///
    /// Returns `false` rather than failing when there was nothing to remove.
    async fn delete(&self, vault: &EdvId, id: &DocumentId) -> Result<bool>;

    /// Find documents matching a blind attribute query, in insertion order.
    async fn find(&self, vault: &EdvId, query: &Query) -> Result<Vec<Document>>;

    /// Count documents matching a blind attribute query.
    async fn count(&self, vault: &EdvId, query: &Query) -> Result<usize>;

    /// Store a chunk of a document's payload.
    ///
    /// # Errors
    /// - `NotFound` if the document does not exist
    /// - `InvalidState` if `chunk.sequence` differs from the document's
    async fn store_chunk(&self, vault: &EdvId, id: &DocumentId, chunk: Chunk) -> Result<()>;

    /// Fetch a chunk of a document's payload.
    ///
    /// # Errors
    /// - `NotFound` if the document or chunk does not exist
    async fn get_chunk(&self, vault: &EdvId, id: &DocumentId, index: u64) -> Result<Chunk>;
}
