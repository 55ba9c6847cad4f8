//! The four derived indexes and the indexer that keeps them in sync with
//! document heads (spec.md §3, §4.2).

use crate::tokenizer::tokenize_unique;
use crate::walk::walk_data;
use ordered_float::OrderedFloat;
use peacedb_core::{Document, Value};
use std::collections::{BTreeMap, BTreeSet};

/// `field path -> value string -> ids`.
pub type EqualityIndex = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;
/// `field path -> numeric value -> ids`, kept as an ordered map so a range
/// lookup is a plain `range()` scan.
pub type NumericIndex = BTreeMap<String, BTreeMap<OrderedFloat<f64>, BTreeSet<String>>>;
/// `lower-cased tag -> ids`.
pub type TagIndex = BTreeMap<String, BTreeSet<String>>;
/// `token -> ids`.
pub type FullTextIndex = BTreeMap<String, BTreeSet<String>>;

/// The four indexes for one database. All derived state, rebuildable from
/// heads alone (spec.md §3 "Indexes").
#[derive(Debug, Default, Clone)]
pub struct Indexes {
    /// Equality postings, including the `content` pseudo-field.
    pub equality: EqualityIndex,
    /// Numeric-range postings.
    pub numeric: NumericIndex,
    /// Tag postings.
    pub tag: TagIndex,
    /// Full-text token postings.
    pub fulltext: FullTextIndex,
}

fn insert_into(map: &mut BTreeMap<String, BTreeSet<String>>, key: String, id: &str) {
    map.entry(key).or_default().insert(id.to_string());
}

fn remove_from(map: &mut BTreeMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(set) = map.get_mut(key) {
        set.remove(id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

impl Indexes {
    /// Add every posting derivable from `doc`'s current head body.
    pub fn index_document(&mut self, doc: &Document) {
        let id = doc.id.as_str();

        if let Some(content) = &doc.content {
            insert_into(
                self.equality.entry("content".to_string()).or_default(),
                content.clone(),
                id,
            );
            for tok in tokenize_unique(content) {
                insert_into(&mut self.fulltext, tok, id);
            }
        }

        for leaf in walk_data(&doc.data) {
            match leaf.value {
                Value::String(s) => {
                    insert_into(
                        self.equality.entry(leaf.path.clone()).or_default(),
                        s.clone(),
                        id,
                    );
                    for tok in tokenize_unique(s) {
                        insert_into(&mut self.fulltext, tok, id);
                    }
                }
                Value::Bool(b) => {
                    let token = if *b { "true" } else { "false" }.to_string();
                    insert_into(self.equality.entry(leaf.path.clone()).or_default(), token, id);
                }
                Value::Int(_) | Value::Float(_) => {
                    if let Some(n) = leaf.value.as_numeric() {
                        self.numeric
                            .entry(leaf.path.clone())
                            .or_default()
                            .entry(OrderedFloat(n))
                            .or_default()
                            .insert(id.to_string());
                    }
                }
                Value::Null | Value::Array(_) | Value::Map(_) => {}
            }
        }

        for tag in &doc.tags {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                continue;
            }
            insert_into(&mut self.tag, trimmed.to_lowercase(), id);
        }
    }

    /// Remove every posting derivable from `doc`'s current head body
    /// (mirror of [`Self::index_document`]).
    pub fn unindex_document(&mut self, doc: &Document) {
        let id = doc.id.as_str();

        if let Some(content) = &doc.content {
            if let Some(set) = self.equality.get_mut("content") {
                remove_from(set, content, id);
                if set.is_empty() {
                    self.equality.remove("content");
                }
            }
            for tok in tokenize_unique(content) {
                remove_from(&mut self.fulltext, &tok, id);
            }
        }

        for leaf in walk_data(&doc.data) {
            match leaf.value {
                Value::String(s) => {
                    if let Some(set) = self.equality.get_mut(&leaf.path) {
                        remove_from(set, s, id);
                        if set.is_empty() {
                            self.equality.remove(&leaf.path);
                        }
                    }
                    for tok in tokenize_unique(s) {
                        remove_from(&mut self.fulltext, &tok, id);
                    }
                }
                Value::Bool(b) => {
                    let token = if *b { "true" } else { "false" }.to_string();
                    if let Some(set) = self.equality.get_mut(&leaf.path) {
                        remove_from(set, &token, id);
                        if set.is_empty() {
                            self.equality.remove(&leaf.path);
                        }
                    }
                }
                Value::Int(_) | Value::Float(_) => {
                    if let Some(n) = leaf.value.as_numeric() {
                        if let Some(by_value) = self.numeric.get_mut(&leaf.path) {
                            let key = OrderedFloat(n);
                            if let Some(set) = by_value.get_mut(&key) {
                                set.remove(id);
                                if set.is_empty() {
                                    by_value.remove(&key);
                                }
                            }
                            if by_value.is_empty() {
                                self.numeric.remove(&leaf.path);
                            }
                        }
                    }
                }
                Value::Null | Value::Array(_) | Value::Map(_) => {}
            }
        }

        for tag in &doc.tags {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                continue;
            }
            remove_from(&mut self.tag, &trimmed.to_lowercase(), id);
        }
    }

    /// Remove `old`'s postings (if any) and add `new`'s. The standard
    /// update-reindex sequence (spec.md §4.2: "Reindex on update is:
    /// unindex(old head) then index(new head)").
    pub fn reindex(&mut self, old: Option<&Document>, new: &Document) {
        if let Some(old) = old {
            self.unindex_document(old);
        }
        self.index_document(new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peacedb_core::Value;
    use std::collections::BTreeMap;

    fn doc(id: &str, n: i64, s: &str, tags: Vec<&str>, content: Option<&str>) -> Document {
        let mut data = BTreeMap::new();
        data.insert("n".to_string(), Value::Int(n));
        data.insert("s".to_string(), Value::String(s.to_string()));
        Document {
            id: id.to_string(),
            rev: None,
            deleted: false,
            data,
            tags: tags.into_iter().map(String::from).collect(),
            content: content.map(String::from),
        }
    }

    #[test]
    fn index_and_query_equality() {
        let mut idx = Indexes::default();
        idx.index_document(&doc("a", 1, "hello", vec![], None));
        let postings = idx.equality.get("data.s").unwrap();
        assert!(postings.get("hello").unwrap().contains("a"));
    }

    #[test]
    fn unindex_removes_empty_keys() {
        let mut idx = Indexes::default();
        let d = doc("a", 1, "hello", vec!["red"], None);
        idx.index_document(&d);
        idx.unindex_document(&d);
        assert!(idx.equality.is_empty());
        assert!(idx.numeric.is_empty());
        assert!(idx.tag.is_empty());
        assert!(idx.fulltext.is_empty());
    }

    #[test]
    fn tags_are_case_insensitive_and_trimmed() {
        let mut idx = Indexes::default();
        idx.index_document(&doc("a", 1, "x", vec![" Red ", ""], None));
        assert!(idx.tag.get("red").unwrap().contains("a"));
        assert_eq!(idx.tag.len(), 1);
    }

    #[test]
    fn content_indexed_for_equality_and_fulltext() {
        let mut idx = Indexes::default();
        idx.index_document(&doc("a", 1, "x", vec![], Some("full text search engines")));
        assert!(idx.fulltext.get("full").unwrap().contains("a"));
        assert!(idx
            .equality
            .get("content")
            .unwrap()
            .get("full text search engines")
            .unwrap()
            .contains("a"));
    }

    #[test]
    fn numeric_index_tracks_values() {
        let mut idx = Indexes::default();
        idx.index_document(&doc("a", 42, "x", vec![], None));
        let by_value = idx.numeric.get("data.n").unwrap();
        assert!(by_value.get(&OrderedFloat(42.0)).unwrap().contains("a"));
    }

    #[test]
    fn reindex_moves_postings() {
        let mut idx = Indexes::default();
        let old = doc("a", 1, "hello", vec![], None);
        idx.index_document(&old);
        let new = doc("a", 2, "world", vec![], None);
        idx.reindex(Some(&old), &new);
        assert!(!idx.equality.get("data.s").unwrap().contains_key("hello"));
        assert!(idx.equality.get("data.s").unwrap().get("world").unwrap().contains("a"));
    }
}
