//! The in-memory, per-database engine (spec.md §4.3).
//!
//! `Database` owns one reader/writer lock guarding its heads, history,
//! indexes and `seq` counter (spec.md §5: "Lock granularity is per
//! database, not per document, not per index"). All public operations
//! acquire either the read or write side of that lock; nothing here talks
//! to disk — that's [`crate`]'s caller, `peacedb-storage`.

use crate::state::DbState;
use parking_lot::RwLock;
use peacedb_core::{next_rev, Document, Error, Result};
use peacedb_index::{Indexes, NumericRange};
use std::collections::BTreeMap;

/// One database: a named namespace of documents plus its indexes and
/// sequence counter.
#[derive(Default)]
pub struct Database {
    state: RwLock<DbState>,
}

fn paginate<T>(mut items: Vec<T>, skip: usize, limit: usize) -> Vec<T> {
    if skip >= items.len() {
        return Vec::new();
    }
    let end = items.len().min(skip.saturating_add(limit));
    items.drain(skip..end).collect()
}

impl Database {
    /// A fresh, empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current head for `id`. `rev` requests an explicit historical
    /// revision if retained; without it, a tombstoned head is treated as
    /// absent (spec.md §4.3 `Get`).
    pub fn get(&self, id: &str, rev: Option<&str>) -> Option<Document> {
        let state = self.state.read();
        if let Some(rev) = rev {
            return state
                .history
                .get(id)
                .and_then(|h| h.get(rev))
                .cloned()
                .or_else(|| {
                    state
                        .heads
                        .get(id)
                        .filter(|d| d.rev.as_deref() == Some(rev))
                        .cloned()
                });
        }
        state
            .heads
            .get(id)
            .filter(|d| !d.deleted)
            .cloned()
    }

    /// Create or update a document. Update requires the current head rev;
    /// create must omit rev (spec.md §4.1 conflict/create rules).
    pub fn put(&self, mut doc: Document) -> Result<Document> {
        if doc.id.is_empty() {
            return Err(Error::Validation("document id must not be empty".into()));
        }
        doc.normalize_tags();

        let mut state = self.state.write();
        let existing = state.heads.get(&doc.id).cloned();

        match (&existing, &doc.rev) {
            (None, Some(_)) => {
                return Err(Error::Conflict(format!(
                    "put of new id {:?} must not supply a rev",
                    doc.id
                )))
            }
            (Some(head), supplied) => {
                if supplied.as_deref() != head.rev.as_deref() {
                    return Err(Error::Conflict(format!(
                        "revision mismatch for {:?}: expected {:?}, got {:?}",
                        doc.id, head.rev, supplied
                    )));
                }
            }
            (None, None) => {}
        }

        let prev_rev = existing.as_ref().and_then(|d| d.rev.as_deref());
        doc.deleted = false;
        doc.rev = Some(next_rev(prev_rev, &doc));
        state.set_head(doc.clone());
        state.seq += 1;
        Ok(doc)
    }

    /// Create a document, assigning a server-generated id if `doc.id` is
    /// empty (spec.md §4.3 `Post`).
    pub fn post(&self, mut doc: Document) -> Result<Document> {
        if doc.id.is_empty() {
            doc.id = generate_id();
        }
        doc.normalize_tags();

        let mut state = self.state.write();
        if let Some(head) = state.heads.get(&doc.id) {
            if !head.deleted {
                return Err(Error::Conflict(format!("id {:?} already exists", doc.id)));
            }
        }

        doc.rev = None;
        doc.deleted = false;
        let rev = next_rev(None, &doc);
        doc.rev = Some(rev);
        state.set_head(doc.clone());
        state.seq += 1;
        Ok(doc)
    }

    /// Soft-delete `id` at `rev` (spec.md §4.3 `Delete`). Returns the
    /// tombstone head so callers (the File Engine's WAL logging) don't
    /// need a follow-up `get`.
    pub fn delete(&self, id: &str, rev: &str) -> Result<Document> {
        let mut state = self.state.write();
        let head = state
            .heads
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no such document {id:?}")))?;

        if head.rev.as_deref() != Some(rev) {
            return Err(Error::Conflict(format!(
                "revision mismatch deleting {:?}: expected {:?}, got {:?}",
                id, head.rev, rev
            )));
        }

        let mut tombstone = head.clone();
        tombstone.deleted = true;
        tombstone.rev = Some(next_rev(Some(rev), &tombstone));
        state.set_head(tombstone.clone());
        state.seq += 1;
        Ok(tombstone)
    }

    /// Stable-ordered page of heads, sorted by id (spec.md §4.3
    /// `AllDocs`).
    pub fn all_docs(&self, skip: usize, limit: usize, include_deleted: bool) -> Vec<Document> {
        let state = self.state.read();
        let mut docs: Vec<Document> = state
            .heads
            .values()
            .filter(|d| include_deleted || !d.deleted)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        paginate(docs, skip, limit)
    }

    /// Intersection of equality postings and an optional numeric range,
    /// sorted/paginated by id (spec.md §4.3 `FindByFields`).
    pub fn find_by_fields(
        &self,
        equals: &BTreeMap<String, String>,
        range: Option<&NumericRange>,
        skip: usize,
        limit: usize,
    ) -> Vec<Document> {
        let state = self.state.read();
        let candidates = if equals.is_empty() && range.is_none() {
            state.heads.keys().cloned().collect()
        } else {
            state
                .indexes
                .find_by_fields(equals, range)
                .unwrap_or_default()
        };
        self.resolve_live(&state, candidates, skip, limit)
    }

    /// Tag set arithmetic, sorted/paginated by id (spec.md §4.3
    /// `FindByTags`).
    pub fn find_by_tags(
        &self,
        all_of: &[String],
        any_of: &[String],
        none_of: &[String],
        skip: usize,
        limit: usize,
    ) -> Vec<Document> {
        let state = self.state.read();
        let universe = state.heads.keys().cloned().collect();
        let candidates = state.indexes.find_by_tags(all_of, any_of, none_of, &universe);
        self.resolve_live(&state, candidates, skip, limit)
    }

    /// Tokenized-AND full-text search, sorted/paginated by id (spec.md
    /// §4.3 `FullTextSearch`).
    pub fn full_text_search(&self, query: &str, skip: usize, limit: usize) -> Vec<Document> {
        let state = self.state.read();
        let candidates = state.indexes.full_text_search(query);
        self.resolve_live(&state, candidates, skip, limit)
    }

    fn resolve_live(
        &self,
        state: &DbState,
        candidates: std::collections::BTreeSet<String>,
        skip: usize,
        limit: usize,
    ) -> Vec<Document> {
        let docs: Vec<Document> = candidates
            .into_iter()
            .filter_map(|id| state.heads.get(&id))
            .filter(|d| !d.deleted)
            .cloned()
            .collect();
        paginate(docs, skip, limit)
    }

    /// Current sequence number.
    pub fn seq(&self) -> u64 {
        self.state.read().seq
    }

    /// Recovery-only import of a document, bypassing conflict checks.
    /// `set_as_head` installs it as the head unconditionally; `reindex`
    /// controls whether the indexes are updated (always true in practice,
    /// kept as a parameter to mirror spec.md's `Import` signature);
    /// `bump_seq` advances `seq` by one (used for WAL replay, not for
    /// snapshot loading, whose `seq` comes from the manifest).
    pub fn import(&self, doc: Document, set_as_head: bool, reindex: bool, bump_seq: bool) {
        let mut state = self.state.write();
        if set_as_head {
            if reindex {
                state.set_head(doc);
            } else {
                state.heads.insert(doc.id.clone(), doc);
            }
        }
        if bump_seq {
            state.seq += 1;
        }
    }

    /// Snapshot of current heads, for streaming to a snapshot file or to a
    /// remote replica during catch-up. Named `export` per spec.md §4.3;
    /// the underlying clone is eager (a single read-lock critical
    /// section), but callers consume the returned vector through an
    /// iterator so a future segmented/streaming writer doesn't need to
    /// change this signature.
    pub fn export(&self) -> Vec<Document> {
        let state = self.state.read();
        let mut docs: Vec<Document> = state.heads.values().cloned().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    /// Set `seq` to `max(current, value)` (spec.md §4.3 `SetSeq`, used by
    /// recovery so the next assigned seq is strictly greater than
    /// anything already on disk).
    pub fn set_seq(&self, value: u64) {
        let mut state = self.state.write();
        state.seq = state.seq.max(value);
    }

    /// Direct access to the indexes, for stats reporting
    /// (`peacedb-sharding`'s `Stats` op).
    pub fn with_indexes<R>(&self, f: impl FnOnce(&Indexes) -> R) -> R {
        f(&self.state.read().indexes)
    }

    /// Counts used by `ShardClient::stats` (spec.md §4.8).
    pub fn doc_counts(&self) -> (usize, usize, usize) {
        let state = self.state.read();
        let total = state.heads.len();
        let deleted = state.heads.values().filter(|d| d.deleted).count();
        (total, total - deleted, deleted)
    }
}

fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:x}{n:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use peacedb_core::Value;

    fn simple_doc(id: &str, n: i64) -> Document {
        let mut data = BTreeMap::new();
        data.insert("n".to_string(), Value::Int(n));
        Document {
            id: id.to_string(),
            rev: None,
            deleted: false,
            data,
            tags: vec![],
            content: None,
        }
    }

    #[test]
    fn put_create_then_update_conflict_then_success() {
        let db = Database::new();
        let created = db.post(simple_doc("", 1)).unwrap();
        assert_eq!(created.rev.as_deref().unwrap().chars().next(), Some('1'));

        let mut stale = created.clone();
        stale.rev = Some("1-bogus".into());
        stale.data.insert("n".to_string(), Value::Int(2));
        let err = db.put(stale).unwrap_err();
        assert!(err.is_conflict());

        let fetched = db.get(&created.id, None).unwrap();
        assert_eq!(fetched.data.get("n"), Some(&Value::Int(1)));

        let mut update = created.clone();
        update.data.insert("n".to_string(), Value::Int(2));
        let updated = db.put(update).unwrap();
        assert!(updated.rev.as_deref().unwrap().starts_with('2'));
        assert_eq!(db.get(&created.id, None).unwrap().data.get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn put_new_id_with_rev_is_conflict() {
        let db = Database::new();
        let mut doc = simple_doc("x", 1);
        doc.rev = Some("1-whatever".into());
        assert!(db.put(doc).unwrap_err().is_conflict());
    }

    #[test]
    fn delete_requires_current_rev() {
        let db = Database::new();
        let created = db.post(simple_doc("x", 1)).unwrap();
        assert!(db.delete("x", "1-stale").is_err());
        db.delete("x", created.rev.as_deref().unwrap()).unwrap();
        assert!(db.get("x", None).is_none());
    }

    #[test]
    fn all_docs_ordered_and_paginated() {
        let db = Database::new();
        for i in 0..5 {
            db.put(simple_doc(&format!("k{i}"), i)).unwrap();
        }
        let page = db.all_docs(1, 2, false);
        assert_eq!(page.iter().map(|d| d.id.clone()).collect::<Vec<_>>(), vec!["k1", "k2"]);
    }

    #[test]
    fn all_docs_include_deleted() {
        let db = Database::new();
        let created = db.post(simple_doc("x", 1)).unwrap();
        db.delete("x", created.rev.as_deref().unwrap()).unwrap();
        assert!(db.all_docs(0, 10, false).is_empty());
        assert_eq!(db.all_docs(0, 10, true).len(), 1);
    }

    #[test]
    fn seq_strictly_increases() {
        let db = Database::new();
        assert_eq!(db.seq(), 0);
        let created = db.post(simple_doc("x", 1)).unwrap();
        assert_eq!(db.seq(), 1);
        db.delete("x", created.rev.as_deref().unwrap()).unwrap();
        assert_eq!(db.seq(), 2);
    }

    #[test]
    fn set_seq_never_decreases() {
        let db = Database::new();
        db.post(simple_doc("x", 1)).unwrap();
        db.set_seq(0);
        assert_eq!(db.seq(), 1);
        db.set_seq(50);
        assert_eq!(db.seq(), 50);
    }
}
