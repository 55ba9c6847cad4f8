//! File Engine configuration (spec.md §6.4 config knobs relevant to
//! durability and snapshotting).

use peacedb_durability::DurabilityMode;
use serde::{Deserialize, Serialize};

/// Per-process settings shared by every database's [`crate::handle::FileEngineHandle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Root directory under which each database gets its own subdirectory.
    pub data_root: std::path::PathBuf,
    /// WAL fsync policy.
    pub durability_mode: DurabilityMode,
    /// If false, never trigger snapshots; recovery is WAL-only (spec.md
    /// §6.4 `EnableSnapshots`).
    pub enable_snapshots: bool,
    /// Snapshot once this many operations have accumulated since the
    /// last one.
    pub snapshot_every_n_operations: u64,
    /// Snapshot once the WAL file reaches this size, in megabytes.
    pub snapshot_max_wal_size_mb: u64,
}

impl StorageConfig {
    /// Defaults suitable for local development: commit-mode durability,
    /// snapshots enabled every 1000 ops or 16MiB of WAL.
    pub fn new(data_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            durability_mode: DurabilityMode::default(),
            enable_snapshots: true,
            snapshot_every_n_operations: 1000,
            snapshot_max_wal_size_mb: 16,
        }
    }
}
