//! Internal per-database state (spec.md §4.3): heads, best-effort history,
//! the four indexes, and the sequence counter.

use peacedb_core::Document;
use peacedb_index::Indexes;
use std::collections::BTreeMap;

/// Everything that makes up one database's in-memory state.
#[derive(Debug, Default)]
pub struct DbState {
    /// `id -> current head` (possibly a tombstone).
    pub heads: BTreeMap<String, Document>,
    /// `id -> rev -> document`, best-effort retention (spec.md §3
    /// "Head vs history": "retention is best-effort and not required for
    /// correctness of reads").
    pub history: BTreeMap<String, BTreeMap<String, Document>>,
    /// The four derived indexes.
    pub indexes: Indexes,
    /// Monotonic per-database mutation counter.
    pub seq: u64,
}

impl DbState {
    /// Record `doc` as the new head for its id, reindexing against the
    /// previous head (if any) and retaining the revision in history.
    pub fn set_head(&mut self, doc: Document) {
        let previous = self.heads.get(&doc.id).cloned();
        self.indexes.reindex(previous.as_ref(), &doc);
        if let Some(rev) = &doc.rev {
            self.history
                .entry(doc.id.clone())
                .or_default()
                .insert(rev.clone(), doc.clone());
        }
        self.heads.insert(doc.id.clone(), doc);
    }
}
