//! The Indexer: equality, numeric-range, tag, and full-text indexes
//! derived from document heads (spec.md §2 component 2, §4.2, §4.3).

#![warn(missing_docs)]

pub mod indexes;
pub mod query;
pub mod tokenizer;
pub mod walk;

pub use indexes::{EqualityIndex, FullTextIndex, Indexes, NumericIndex, TagIndex};
pub use query::NumericRange;
