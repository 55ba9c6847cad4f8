//! The in-memory engine (spec.md §2 component 3, §4.3): a per-database map
//! of id -> head + revision history + the four indexes, plus the
//! multi-database registry that owns them.
//!
//! This crate has no knowledge of durability; `peacedb-storage` composes it
//! with the WAL and snapshots.

#![warn(missing_docs)]

pub mod database;
pub mod registry;
pub mod state;

pub use database::Database;
pub use registry::Engine;
