//! Identifier types used throughout the EDV service.
//!
//! Vault and document ids share one encoding: a multibase base58btc string
//! (`z` prefix) wrapping an identity multihash of 16 random bytes, i.e. the
//! 18 bytes `0x00 0x10 <16 bytes>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Multibase prefix for base58btc.
const MULTIBASE_BASE58_BTC: char = 'z';

/// Identity multihash code followed by the digest length.
const MULTIHASH_IDENTITY_16: [u8; 2] = [0x00, 0x10];

/// Number of random bytes carried by an id.
const ID_RANDOM_LEN: usize = 16;

fn check_encoding(what: &str, id: &str) -> crate::Result<()> {
    let Some(encoded) = id.strip_prefix(MULTIBASE_BASE58_BTC) else {
        return Err(crate::Error::Syntax(format!(
            "{what} must be a multibase base58btc string: {id}"
        )));
    };

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| crate::Error::Syntax(format!("{what} is not valid base58btc: {e}")))?;

    if bytes.len() != MULTIHASH_IDENTITY_16.len() + ID_RANDOM_LEN
        || bytes[..2] != MULTIHASH_IDENTITY_16
    {
        return Err(crate::Error::Syntax(format!(
            "{what} must encode a 16 byte identity multihash: {id}"
        )));
    }

    Ok(())
}

fn generate_encoded() -> String {
    let mut bytes = Vec::with_capacity(MULTIHASH_IDENTITY_16.len() + ID_RANDOM_LEN);
    bytes.extend_from_slice(&MULTIHASH_IDENTITY_16);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    format!("{}{}", MULTIBASE_BASE58_BTC, bs58::encode(bytes).into_string())
}

/// Local identifier of a vault (the last path segment of its URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EdvId(String);

impl EdvId {
    /// Parse and validate a vault id.
    ///
    /// # Errors
    /// - `Error::Syntax` if the string is not a well-formed id
    pub fn parse(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        check_encoding("vault id", &id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random vault id.
    pub fn generate() -> Self {
        Self(generate_encoded())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EdvId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(value)
    }
}

impl From<EdvId> for String {
    fn from(id: EdvId) -> Self {
        id.0
    }
}

/// Identifier of a document, unique within its vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse and validate a document id.
    ///
    /// # Preconditions
    /// - `id` is a `z`-prefixed base58btc string
    ///
    /// # Errors
    /// - `Error::Syntax` if the encoding, alphabet or decoded length is wrong
    pub fn parse(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        check_encoding("document id", &id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random document id.
    pub fn generate() -> Self {
        Self(generate_encoded())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}
