//! Full-text tokenizer (spec.md §4.2).
//!
//! Tokens are maximal runs of Unicode letter-or-digit characters, length
//! >= 2, lower-cased. The tokenizer is identical on the index and query
//! side, so indexing and search can't silently diverge.

/// Tokenize `text` into searchable terms.
///
/// ```
/// use peacedb_index::tokenizer::tokenize;
///
/// let tokens = tokenize("Hello, World! v2");
/// assert_eq!(tokens, vec!["hello", "world", "v2"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= 2)
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, preserving first-seen order. Used for query
/// processing where each distinct token should only gate the result set
/// once.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
