//! Query helpers over [`crate::indexes::Indexes`] (spec.md §4.3).

use crate::indexes::Indexes;
use crate::tokenizer::tokenize_unique;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// An inclusive numeric range; either bound absent means unbounded on that
/// side (spec.md §4.3: "-inf/+inf when a bound is absent").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumericRange {
    /// The indexed field path to range over.
    pub field: String,
    /// Inclusive lower bound, or unbounded.
    pub min: Option<f64>,
    /// Inclusive upper bound, or unbounded.
    pub max: Option<f64>,
}

impl Indexes {
    /// Equality-map intersected with an optional numeric range (spec.md
    /// §4.3 `FindByFields`). An empty `equals` map with no range matches
    /// every document (spec.md §8 boundary behavior) — callers detect that
    /// case and fall back to `all_ids` since this function has no access
    /// to the full id universe.
    pub fn find_by_fields(
        &self,
        equals: &BTreeMap<String, String>,
        range: Option<&NumericRange>,
    ) -> Option<BTreeSet<String>> {
        let mut result: Option<BTreeSet<String>> = None;

        for (field, value) in equals {
            let matched = self
                .equality
                .get(field)
                .and_then(|by_value| by_value.get(value))
                .cloned()
                .unwrap_or_default();
            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).cloned().collect(),
            });
        }

        if let Some(range) = range {
            let matched = self.numeric_range_ids(range);
            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).cloned().collect(),
            });
        }

        result
    }

    fn numeric_range_ids(&self, range: &NumericRange) -> BTreeSet<String> {
        let Some(by_value) = self.numeric.get(&range.field) else {
            return BTreeSet::new();
        };
        let lower = match range.min {
            Some(m) => Bound::Included(OrderedFloat(m)),
            None => Bound::Unbounded,
        };
        let upper = match range.max {
            Some(m) => Bound::Included(OrderedFloat(m)),
            None => Bound::Unbounded,
        };
        let mut out = BTreeSet::new();
        for (_, ids) in by_value.range((lower, upper)) {
            out.extend(ids.iter().cloned());
        }
        out
    }

    /// Tag set arithmetic (spec.md §4.3 `FindByTags`): `allOf` intersection,
    /// intersected with `anyOf` union, minus `noneOf` union. An empty
    /// `allOf`/`anyOf` clause is treated as "everything" and so contributes
    /// no restriction; an empty `noneOf` removes nothing.
    pub fn find_by_tags(
        &self,
        all_of: &[String],
        any_of: &[String],
        none_of: &[String],
        all_ids: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut result = all_ids.clone();

        for tag in all_of {
            let ids = self.tag_ids(tag);
            result = result.intersection(&ids).cloned().collect();
        }

        if !any_of.is_empty() {
            let mut union = BTreeSet::new();
            for tag in any_of {
                union.extend(self.tag_ids(tag));
            }
            result = result.intersection(&union).cloned().collect();
        }

        if !none_of.is_empty() {
            let mut union = BTreeSet::new();
            for tag in none_of {
                union.extend(self.tag_ids(tag));
            }
            result = result.difference(&union).cloned().collect();
        }

        result
    }

    fn tag_ids(&self, tag: &str) -> BTreeSet<String> {
        self.tag
            .get(&tag.trim().to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Tokenize `query` and intersect postings for every non-empty token
    /// (AND semantics, spec.md §4.3). An empty query yields an empty
    /// result (spec.md §8 boundary behavior).
    pub fn full_text_search(&self, query: &str) -> BTreeSet<String> {
        let tokens = tokenize_unique(query);
        if tokens.is_empty() {
            return BTreeSet::new();
        }
        let mut result: Option<BTreeSet<String>> = None;
        for tok in tokens {
            let matched = self.fulltext.get(&tok).cloned().unwrap_or_default();
            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).cloned().collect(),
            });
        }
        result.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::Indexes;
    use peacedb_core::{Document, Value};
    use std::collections::BTreeMap;

    fn doc(id: &str, n: i64, tags: Vec<&str>, content: &str) -> Document {
        let mut data = BTreeMap::new();
        data.insert("n".to_string(), Value::Int(n));
        Document {
            id: id.to_string(),
            rev: None,
            deleted: false,
            data,
            tags: tags.into_iter().map(String::from).collect(),
            content: Some(content.to_string()),
        }
    }

    fn build() -> Indexes {
        let mut idx = Indexes::default();
        idx.index_document(&doc("a", 1, vec!["red", "small"], "full text indexing helps"));
        idx.index_document(&doc("b", 5, vec!["blue", "small"], "full text databases rule"));
        idx.index_document(&doc("c", 10, vec!["red", "large"], "databases are great"));
        idx
    }

    #[test]
    fn numeric_range_inclusive_bounds() {
        let idx = build();
        let range = NumericRange {
            field: "data.n".into(),
            min: Some(5.0),
            max: Some(10.0),
        };
        let ids = idx.find_by_fields(&BTreeMap::new(), Some(&range)).unwrap();
        assert_eq!(ids, BTreeSet::from(["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn tag_all_of_any_of_none_of() {
        let idx = build();
        let universe: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ids = idx.find_by_tags(&["red".to_string()], &[], &["large".to_string()], &universe);
        assert_eq!(ids, BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn full_text_and_semantics() {
        let idx = build();
        assert_eq!(
            idx.full_text_search("full text indexing databases"),
            BTreeSet::new()
        );
        assert_eq!(
            idx.full_text_search("full text"),
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
        assert_eq!(idx.full_text_search(""), BTreeSet::new());
    }
}
