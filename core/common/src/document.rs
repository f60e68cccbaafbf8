//! Encrypted document wire model.

use serde::{Deserialize, Serialize};

use crate::{DocumentId, Error, Result};

/// Reference to a key held by an external key management service.
///
/// The vault never dereferences it; it is stored and compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyReference {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
}

impl KeyReference {
    pub fn new(id: impl Into<String>, key_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key_type: key_type.into(),
        }
    }
}

/// A blinded attribute record: both name and value are opaque tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexAttribute {
    pub name: String,
    pub value: String,
    /// At most one document per vault may carry this name/value pair.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
}

impl IndexAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unique: false,
        }
    }
}

/// Index entries produced under one index configuration (one HMAC key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntrySet {
    pub hmac: KeyReference,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub attributes: Vec<IndexAttribute>,
}

impl IndexEntrySet {
    /// An entry set with no attributes.
    pub fn empty(hmac: KeyReference) -> Self {
        Self {
            hmac,
            sequence: 0,
            attributes: Vec::new(),
        }
    }
}

/// A stored encrypted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub sequence: u64,
    #[serde(default)]
    pub indexed: Vec<IndexEntrySet>,
    /// Ciphertext payload; never interpreted by the server.
    pub content: serde_json::Value,
}

impl Document {
    /// All attribute records across every entry set.
    pub fn attributes(&self) -> impl Iterator<Item = &IndexAttribute> {
        self.indexed.iter().flat_map(|set| set.attributes.iter())
    }
}

/// Document body as submitted by a client.
///
/// The id is optional on insert and is validated here rather than during
/// deserialization so that a malformed id surfaces as a syntax error.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub indexed: Vec<IndexEntrySet>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl NewDocument {
    /// Validate the body and turn it into a document.
    ///
    /// A missing id is replaced by a freshly generated one.
    ///
    /// # Errors
    /// - `Error::Syntax` if the id is malformed
    /// - `Error::Validation` if `content` is missing or not an object
    pub fn into_document(self) -> Result<Document> {
        let id = match self.id {
            Some(id) => DocumentId::parse(id)?,
            None => DocumentId::generate(),
        };

        let content = match self.content {
            Some(content @ serde_json::Value::Object(_)) => content,
            Some(_) => {
                return Err(Error::Validation(
                    "Document content must be an object".to_string(),
                ))
            }
            None => return Err(Error::Validation("Document content is required".to_string())),
        };

        Ok(Document {
            id,
            sequence: self.sequence,
            indexed: self.indexed,
            content,
        })
    }
}

/// A numbered piece of a large encrypted payload attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u64,
    #[serde(default)]
    pub offset: u64,
    /// Sequence of the owning document this chunk was written against.
    pub sequence: u64,
    pub jwe: serde_json::Value,
}
