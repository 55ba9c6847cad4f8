//! Deterministic canonical encoding of a document body (spec.md §4.1).
//!
//! `canonical_body` must produce byte-identical output for equal documents
//! across processes of the same deployment, since it feeds directly into
//! revision hashing. `Value::Map` is already a `BTreeMap` so key order is
//! deterministic without an extra sort pass; `serde_json::to_vec` on a
//! `BTreeMap`-backed structure preserves that order.

use crate::document::Document;
use serde::Serialize;

/// A minimal, order-stable view of a document used only for hashing. Kept
/// separate from the wire `Document` struct so that adding wire-only fields
/// later can't silently change existing revision hashes.
#[derive(Serialize)]
struct CanonicalDoc<'a> {
    deleted: bool,
    data: &'a std::collections::BTreeMap<String, crate::value::Value>,
    tags: &'a [String],
    content: &'a Option<String>,
}

/// Serialize `doc` (with `id`/`rev` conceptually cleared) to the canonical
/// byte representation hashed by [`crate::revision::next_rev`].
pub fn canonical_body(doc: &Document) -> Vec<u8> {
    let mut tags = doc.tags.clone();
    tags.sort();
    let canon = CanonicalDoc {
        deleted: doc.deleted,
        data: &doc.data,
        tags: &tags,
        content: &doc.content,
    };
    // A BTreeMap-backed struct serialized through serde_json yields stable
    // key ordering; unwrap is safe because Value has no serialization
    // failure modes (no non-finite floats going through this path are
    // rejected at the API boundary before reaching here).
    serde_json::to_vec(&canon).expect("canonical document body is always serializable")
}
