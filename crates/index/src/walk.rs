//! Tree walk over a document's `data` producing `(path, value)` leaf pairs
//! (spec.md §4.2).

use peacedb_core::Value;

/// A single leaf found while walking `data`: its dotted/bracketed path and
/// a reference to its value.
pub struct Leaf<'a> {
    /// e.g. `data.meta.tags[0]`.
    pub path: String,
    /// The leaf value (never `Array` or `Map`).
    pub value: &'a Value,
}

/// Walk `data`, yielding one [`Leaf`] per scalar (string/number/bool)
/// reached. `null` values are skipped (spec.md §4.2: "null/undefined → no
/// posting").
pub fn walk_data(data: &std::collections::BTreeMap<String, Value>) -> Vec<Leaf<'_>> {
    let mut out = Vec::new();
    for (key, value) in data {
        walk_value(&format!("data.{key}"), value, &mut out);
    }
    out
}

fn walk_value<'a>(path: &str, value: &'a Value, out: &mut Vec<Leaf<'a>>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_value(&format!("{path}[{i}]"), item, out);
            }
        }
        Value::Map(map) => {
            for (k, v) in map {
                walk_value(&format!("{path}.{k}"), v, out);
            }
        }
        scalar => out.push(Leaf {
            path: path.to_string(),
            value: scalar,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn walks_nested_maps_and_arrays() {
        let mut inner = BTreeMap::new();
        inner.insert(
            "tags".to_string(),
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
        );
        let mut data = BTreeMap::new();
        data.insert("meta".to_string(), Value::Map(inner));
        data.insert("n".to_string(), Value::Int(5));
        data.insert("skip".to_string(), Value::Null);

        let leaves = walk_data(&data);
        let paths: Vec<&str> = leaves.iter().map(|l| l.path.as_str()).collect();
        assert!(paths.contains(&"data.meta.tags[0]"));
        assert!(paths.contains(&"data.meta.tags[1]"));
        assert!(paths.contains(&"data.n"));
        assert!(!paths.contains(&"data.skip"));
    }
}
