//! Durability primitives for PeaceDatabase (spec.md §2 component 2, §4.4,
//! §4.5): the write-ahead log, snapshot files, the manifest that ties
//! them together, and the per-database directory layout.
//!
//! This crate knows nothing about the in-memory engine; `peacedb-storage`
//! composes it with `peacedb-engine` to implement the write and recovery
//! sequences.

#![warn(missing_docs)]

pub mod manifest;
pub mod paths;
pub mod snapshot;
pub mod wal;

pub use manifest::{read_manifest, write_manifest, Manifest};
pub use paths::{DatabasePaths, FileNames};
pub use snapshot::{read_snapshot, write_snapshot};
pub use wal::{replay, DurabilityMode, WalReplay, WalRecord, WalWriter};
