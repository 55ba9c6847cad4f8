//! Revision computation (spec.md §4.1).
//!
//! A revision string has the form `N-hex` where `N` is a monotonically
//! increasing per-id generation counter and `hex` is a content hash of the
//! canonical body. The hash function is fixed (SHA-256, truncated to 128
//! bits of hex) so that revisions are stable across processes of the same
//! deployment; the exact digest choice is an implementation decision per
//! spec.md §4.1, not part of the wire contract.

use crate::canonical::canonical_body;
use crate::document::Document;
use sha2::{Digest, Sha256};

/// Compute the content hash portion of a revision for `doc`'s canonical
/// body.
pub fn compute_rev_hash(doc: &Document) -> String {
    let bytes = canonical_body(doc);
    let digest = Sha256::digest(&bytes);
    hex::encode(&digest[..16])
}

/// Parse the generation number out of a revision string. Malformed
/// revisions (missing `-`, non-numeric prefix) parse as generation `0`,
/// which callers should treat as "the revision didn't originate here" since
/// a real revision's generation is always `>= 1`.
pub fn generation_of(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Compute the next revision for `doc` given the previous revision string,
/// if any. Absent previous rev implies generation `1` (create).
pub fn next_rev(prev_rev: Option<&str>, doc: &Document) -> String {
    let next_gen = prev_rev.map(generation_of).unwrap_or(0) + 1;
    format!("{next_gen}-{}", compute_rev_hash(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn doc(n: i64) -> Document {
        let mut data = BTreeMap::new();
        data.insert("n".to_string(), Value::Int(n));
        Document {
            id: "x".into(),
            rev: None,
            deleted: false,
            data,
            tags: vec![],
            content: None,
        }
    }

    #[test]
    fn create_rev_starts_at_generation_one() {
        let rev = next_rev(None, &doc(1));
        assert!(rev.starts_with("1-"));
    }

    #[test]
    fn generation_increments() {
        let r1 = next_rev(None, &doc(1));
        let r2 = next_rev(Some(&r1), &doc(2));
        assert!(r2.starts_with("2-"));
    }

    #[test]
    fn same_body_same_hash() {
        let r1 = next_rev(None, &doc(1));
        let r2 = next_rev(None, &doc(1));
        assert_eq!(r1, r2);
    }

    #[test]
    fn different_body_different_hash() {
        let r1 = next_rev(None, &doc(1));
        let r2 = next_rev(None, &doc(2));
        assert_ne!(r1, r2);
    }

    #[test]
    fn malformed_prior_rev_parses_as_generation_zero() {
        assert_eq!(generation_of("bogus"), 0);
        assert_eq!(generation_of("1-bogus"), 1);
    }
}
