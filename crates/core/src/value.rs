//! The document value type.
//!
//! `data` on a [`crate::document::Document`] is a nested mapping from string
//! keys to [`Value`]. This is the tagged variant spec.md §9 calls for in
//! place of a host-language "dynamic" type: the indexer switches on the tag,
//! and [`crate::canonical`] serializes it in a fixed key order so that two
//! documents with the same logical content always hash to the same
//! revision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A JSON-like value stored inside document `data`.
///
/// `Map` uses a `BTreeMap` rather than a `HashMap` so that canonicalization
/// (see [`crate::canonical::canonical_body`]) doesn't need a separate sort
/// pass: key order is already deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer. Kept distinct from `Float` so integral values don't
    /// pick up a trailing `.0` in canonical form.
    Int(i64),
    /// JSON number with a fractional part.
    Float(f64),
    /// JSON string.
    String(String),
    /// JSON array.
    Array(Vec<Value>),
    /// JSON object, insertion order irrelevant (indexing doesn't depend on
    /// it, and canonicalization sorts keys anyway).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value rendered as an equality-index posting string, or `None`
    /// for types that don't produce equality postings (array/map are
    /// walked instead, see [`crate::index`]).
    pub fn as_equality_token(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "true".to_string() } else { "false".to_string() }),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format!("{f}")),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Map(_) => None,
        }
    }

    /// The value as an `f64` for the numeric index, if it's numeric.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert from `serde_json::Value`, used at the API boundary where
    /// documents arrive as JSON.
    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => Value::Map(
                o.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to `serde_json::Value`, used when rendering documents back
    /// out to a caller.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_token_bool() {
        assert_eq!(Value::Bool(true).as_equality_token(), Some("true".into()));
        assert_eq!(Value::Bool(false).as_equality_token(), Some("false".into()));
    }

    #[test]
    fn equality_token_skips_containers() {
        assert_eq!(Value::Array(vec![]).as_equality_token(), None);
        assert_eq!(Value::Map(BTreeMap::new()).as_equality_token(), None);
        assert_eq!(Value::Null.as_equality_token(), None);
    }

    #[test]
    fn numeric_extraction() {
        assert_eq!(Value::Int(4).as_numeric(), Some(4.0));
        assert_eq!(Value::Float(4.5).as_numeric(), Some(4.5));
        assert_eq!(Value::String("4".into()).as_numeric(), None);
    }

    #[test]
    fn json_round_trip() {
        let v = serde_json::json!({"a": 1, "b": [true, null, "x"], "c": 2.5});
        let val = Value::from_json(v.clone());
        assert_eq!(val.to_json(), v);
    }
}
