//! Blind-attribute query model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Document;

/// A query over blinded index attributes.
///
/// `has` lists attribute names that must all be present; `equals` lists
/// name/value maps whose pairs must all match. When both are given the
/// document must satisfy both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equals: Vec<BTreeMap<String, String>>,
    /// Return only the number of matches.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub count: bool,
}

impl Query {
    /// Query for documents carrying every named attribute.
    pub fn has<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            has: attributes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Query for documents carrying an attribute with the given value.
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut pair = BTreeMap::new();
        pair.insert(name.into(), value.into());
        Self {
            equals: vec![pair],
            ..Self::default()
        }
    }

    /// Whether the query names no terms at all.
    pub fn is_empty(&self) -> bool {
        self.has.is_empty() && self.equals.iter().all(BTreeMap::is_empty)
    }

    /// Every requested `(name, value)` pair across all `equals` maps.
    pub fn equality_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.equals
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Result of a query: the matching documents, or their count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Documents(Vec<Document>),
    Count { count: usize },
}
