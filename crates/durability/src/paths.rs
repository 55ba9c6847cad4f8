//! Per-database directory layout (spec.md §6.3).
//!
//! ```text
//! <dataRoot>/
//!   <sanitizedDbName>/
//!     wal.log               line-delimited, append-only WAL
//!     manifest.json         { lastSeq, activeSnapshot, snapshotTimeUtc }
//!     snapshot-<seq>        line-delimited full heads dump(s)
//! ```

use std::path::{Path, PathBuf};

/// File name knobs (spec.md §6.4: `ManifestFileName`, `SnapshotPrefix`,
/// `SnapshotExt`, `WalFileName`).
#[derive(Debug, Clone)]
pub struct FileNames {
    /// WAL file name, default `wal.log`.
    pub wal_file_name: String,
    /// Manifest file name, default `manifest.json`.
    pub manifest_file_name: String,
    /// Prefix for snapshot files, default `snapshot-`.
    pub snapshot_prefix: String,
    /// Extension appended to snapshot files, default empty.
    pub snapshot_ext: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            wal_file_name: "wal.log".to_string(),
            manifest_file_name: "manifest.json".to_string(),
            snapshot_prefix: "snapshot-".to_string(),
            snapshot_ext: String::new(),
        }
    }
}

/// Resolved paths for one database directory under the data root.
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    root: PathBuf,
    names: FileNames,
}

impl DatabasePaths {
    /// Build paths for `sanitized_db_name` under `data_root`.
    pub fn new(data_root: impl AsRef<Path>, sanitized_db_name: &str, names: FileNames) -> Self {
        Self {
            root: data_root.as_ref().join(sanitized_db_name),
            names,
        }
    }

    /// The database's own directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The WAL file path.
    pub fn wal_file(&self) -> PathBuf {
        self.root.join(&self.names.wal_file_name)
    }

    /// The manifest file path.
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join(&self.names.manifest_file_name)
    }

    /// Path for the snapshot with sequence number `seq`.
    pub fn snapshot_file(&self, seq: u64) -> PathBuf {
        let name = format!("{}{}{}", self.names.snapshot_prefix, seq, self.names.snapshot_ext);
        self.root.join(name)
    }

    /// Parse a snapshot sequence number back out of a file name produced by
    /// [`Self::snapshot_file`].
    pub fn parse_snapshot_seq(&self, file_name: &str) -> Option<u64> {
        let stripped = file_name.strip_prefix(&self.names.snapshot_prefix)?;
        let stripped = stripped.strip_suffix(&self.names.snapshot_ext).unwrap_or(stripped);
        stripped.parse().ok()
    }

    /// Ensure the directory exists.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_paths() {
        let paths = DatabasePaths::new("/data", "app", FileNames::default());
        assert_eq!(paths.wal_file(), PathBuf::from("/data/app/wal.log"));
        assert_eq!(paths.manifest_file(), PathBuf::from("/data/app/manifest.json"));
        assert_eq!(paths.snapshot_file(42), PathBuf::from("/data/app/snapshot-42"));
    }

    #[test]
    fn round_trips_snapshot_seq() {
        let paths = DatabasePaths::new("/data", "app", FileNames::default());
        assert_eq!(paths.parse_snapshot_seq("snapshot-42"), Some(42));
        assert_eq!(paths.parse_snapshot_seq("manifest.json"), None);
    }
}
