//! Document model, revisioning, and the unified error type for
//! PeaceDatabase.
//!
//! This crate is the bottom of the stack: every other workspace crate
//! depends on the [`Document`]/[`Value`] types and [`Error`] defined here.
//! It has no knowledge of storage, sharding, or replication.

#![warn(missing_docs)]

pub mod canonical;
pub mod dbname;
pub mod document;
pub mod error;
pub mod revision;
pub mod value;

pub use dbname::sanitize_db_name;
pub use document::Document;
pub use error::{Error, Result};
pub use revision::{compute_rev_hash, generation_of, next_rev};
pub use value::Value;
