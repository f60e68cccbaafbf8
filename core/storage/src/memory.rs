//! In-memory document store.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::ledger::{SequenceLedger, Transition, WriteMode};
use crate::provider::DocumentStorage;
use edvault_common::{
    Chunk, Document, DocumentId, EdvId, Error, IndexEntrySet, KeyReference, Query, Result,
};
use edvault_index::IndexEngine;

/// A stored document and its insertion position.
#[derive(Debug, Clone)]
struct Entry {
    doc: Document,
    position: u64,
}

/// Everything stored for one vault.
///
/// Documents, sequences, index and chunks share one lock so that a write
/// is observed by readers either entirely or not at all.
#[derive(Debug)]
struct Partition {
    hmac: KeyReference,
    documents: HashMap<DocumentId, Entry>,
    ledger: SequenceLedger,
    index: IndexEngine,
    chunks: HashMap<DocumentId, BTreeMap<u64, Chunk>>,
    next_position: u64,
}

impl Partition {
    fn new(hmac: KeyReference) -> Self {
        Self {
            hmac,
            documents: HashMap::new(),
            ledger: SequenceLedger::new(),
            index: IndexEngine::new(),
            chunks: HashMap::new(),
            next_position: 0,
        }
    }

    /// Bring a document's entry sets into stored form.
    fn normalize(&self, doc: &mut Document, sequence: u64) {
        if !doc.indexed.iter().any(|set| set.hmac.id == self.hmac.id) {
            doc.indexed.insert(0, IndexEntrySet::empty(self.hmac.clone()));
        }
        self.index.prune(doc);
        doc.sequence = sequence;
        for set in &mut doc.indexed {
            set.sequence = sequence;
        }
    }

    fn write(&mut self, mut doc: Document, mode: WriteMode) -> Result<Document> {
        let transition = self.ledger.transition(&doc.id, mode, doc.sequence)?;
        self.normalize(&mut doc, transition.sequence());

        // The index rejects unique collisions before mutating anything, so
        // it goes first; the ledger cannot fail once the transition is known.
        let position = match transition {
            Transition::Create => {
                self.index.index_document(&doc)?;
                let position = self.next_position;
                self.next_position += 1;
                position
            }
            Transition::Advance { .. } => {
                let previous = self.documents.get(&doc.id).ok_or_else(|| {
                    Error::Internal(format!("Ledger tracks missing document {}", doc.id))
                })?;
                let position = previous.position;
                self.index.reindex_document(&previous.doc, &doc)?;
                position
            }
        };
        self.ledger.apply(&doc.id, transition)?;

        self.documents.insert(
            doc.id.clone(),
            Entry {
                doc: doc.clone(),
                position,
            },
        );
        Ok(doc)
    }

    fn matching(&self, query: &Query) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self
            .index
            .query(query)
            .iter()
            .filter_map(|id| self.documents.get(id))
            .collect();
        entries.sort_by_key(|entry| entry.position);
        entries
    }
}

/// In-memory document store.
///
/// All data is held in memory and lost on drop.
pub struct MemoryDocumentStore {
    partitions: RwLock<HashMap<EdvId, Arc<RwLock<Partition>>>>,
}

impl MemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    async fn partition(&self, vault: &EdvId) -> Result<Arc<RwLock<Partition>>> {
        self.partitions
            .read()
            .await
            .get(vault)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Vault not found: {vault}")))
    }

    async fn write(&self, vault: &EdvId, doc: Document, mode: WriteMode) -> Result<Document> {
        let partition = self.partition(vault).await?;
        let mut partition = partition.write().await;
        let stored = partition.write(doc, mode)?;

        info!(
            vault = %vault,
            document = %stored.id,
            sequence = stored.sequence,
            "Document stored"
        );
        Ok(stored)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStorage for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open_vault(&self, vault: &EdvId, hmac: KeyReference) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        match partitions.get(vault) {
            Some(existing) => {
                existing.write().await.hmac = hmac;
                debug!(vault = %vault, "Vault partition reconfigured");
            }
            None => {
                partitions.insert(vault.clone(), Arc::new(RwLock::new(Partition::new(hmac))));
                debug!(vault = %vault, "Vault partition created");
            }
        }
        Ok(())
    }

    async fn ensure_index(&self, vault: &EdvId, attribute: &str, unique: bool) -> Result<()> {
        if attribute.is_empty() {
            return Err(Error::Validation("Index attribute cannot be empty".to_string()));
        }
        let partition = self.partition(vault).await?;
        partition.write().await.index.ensure_index(attribute, unique);
        Ok(())
    }

    async fn insert(&self, vault: &EdvId, doc: Document) -> Result<Document> {
        self.write(vault, doc, WriteMode::Insert).await
    }

    async fn update(&self, vault: &EdvId, doc: Document) -> Result<Document> {
        self.write(vault, doc, WriteMode::Upsert).await
    }

    async fn get(&self, vault: &EdvId, id: &DocumentId) -> Result<Document> {
        let partition = self.partition(vault).await?;
        let partition = partition.read().await;
        partition
            .documents
            .get(id)
            .map(|entry| entry.doc.clone())
            .ok_or_else(|| Error::NotFound(format!("Document not found: {id}")))
    }

    async fn delete(&self, vault: &EdvId, id: &DocumentId) -> Result<bool> {
        let partition = self.partition(vault).await?;
        let mut partition = partition.write().await;

        if partition.documents.remove(id).is_none() {
            debug!(vault = %vault, document = %id, "Nothing to delete");
            return Ok(false);
        }
        partition.index.remove_document(id);
        partition.ledger.remove(id);
        partition.chunks.remove(id);

        info!(vault = %vault, document = %id, "Document deleted");
        Ok(true)
    }

    async fn find(&self, vault: &EdvId, query: &Query) -> Result<Vec<Document>> {
        let partition = self.partition(vault).await?;
        let partition = partition.read().await;
        let documents: Vec<Document> = partition
            .matching(query)
            .into_iter()
            .map(|entry| entry.doc.clone())
            .collect();

        debug!(vault = %vault, matches = documents.len(), "Query evaluated");
        Ok(documents)
    }

    async fn count(&self, vault: &EdvId, query: &Query) -> Result<usize> {
        let partition = self.partition(vault).await?;
        let partition = partition.read().await;
        Ok(partition.matching(query).len())
    }

    async fn store_chunk(&self, vault: &EdvId, id: &DocumentId, chunk: Chunk) -> Result<()> {
        let partition = self.partition(vault).await?;
        let mut partition = partition.write().await;

        let sequence = partition
            .documents
            .get(id)
            .map(|entry| entry.doc.sequence)
            .ok_or_else(|| Error::NotFound(format!("Document not found: {id}")))?;
        if chunk.sequence != sequence {
            return Err(Error::InvalidState(format!(
                "Chunk sequence {} does not match document sequence {sequence}",
                chunk.sequence
            )));
        }

        debug!(vault = %vault, document = %id, chunk = chunk.index, "Chunk stored");
        partition
            .chunks
            .entry(id.clone())
            .or_default()
            .insert(chunk.index, chunk);
        Ok(())
    }

    async fn get_chunk(&self, vault: &EdvId, id: &DocumentId, index: u64) -> Result<Chunk> {
        let partition = self.partition(vault).await?;
        let partition = partition.read().await;

        if !partition.documents.contains_key(id) {
            return Err(Error::NotFound(format!("Document not found: {id}")));
        }
        partition
            .chunks
            .get(id)
            .and_then(|chunks| chunks.get(&index))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Chunk {index} not found for {id}")))
    }
}
