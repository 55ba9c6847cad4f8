//! The document type (spec.md §3).

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A document as stored and returned by the engine.
///
/// `id` is always present on a document the caller receives back; it may be
/// absent on a `Post` request where the server is expected to assign one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Non-empty opaque identifier, stable for the document's lifetime.
    pub id: String,
    /// Revision marker. Absent on a create request; required on update and
    /// delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Soft-delete flag. `true` on a tombstoned head.
    #[serde(default)]
    pub deleted: bool,
    /// Nested field data.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Free-form tags, order-insignificant for indexing.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional free-text body, indexed alongside the strings in `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Document {
    /// A document is equal to another within a database iff their `id`s
    /// match (spec.md §3).
    pub fn same_identity(&self, other: &Document) -> bool {
        self.id == other.id
    }

    /// Produce a copy with `id` and `rev` cleared, used as the input to
    /// [`crate::canonical::canonical_body`].
    pub fn body_only(&self) -> Document {
        Document {
            id: String::new(),
            rev: None,
            ..self.clone()
        }
    }

    /// Trim and drop empty tags (spec.md §4.2 policies).
    pub fn normalize_tags(&mut self) {
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
}
