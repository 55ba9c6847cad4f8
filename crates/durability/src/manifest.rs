//! The manifest file: `{ lastSeq, activeSnapshot, snapshotTimeUtc }`,
//! persisted atomically with the same write-fsync-rename pattern as
//! [`crate::snapshot`].

use chrono::{DateTime, Utc};
use peacedb_core::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Recovery bookkeeping for one database: the last durable sequence
/// number and which snapshot (if any) recovery should start from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Highest sequence number known to be durable (in a snapshot or WAL).
    #[serde(rename = "lastSeq")]
    pub last_seq: u64,
    /// File name (not full path) of the most recent snapshot, if any.
    #[serde(rename = "activeSnapshot", skip_serializing_if = "Option::is_none")]
    pub active_snapshot: Option<String>,
    /// When `active_snapshot` was written.
    #[serde(rename = "snapshotTimeUtc", skip_serializing_if = "Option::is_none")]
    pub snapshot_time_utc: Option<DateTime<Utc>>,
}

impl Manifest {
    /// A manifest for a brand new database: no snapshot, nothing durable
    /// yet.
    pub fn empty() -> Self {
        Self {
            last_seq: 0,
            active_snapshot: None,
            snapshot_time_utc: None,
        }
    }

    /// Record that `snapshot_file_name` was just written at `seq`, taken
    /// at `now`.
    pub fn record_snapshot(&mut self, snapshot_file_name: String, seq: u64, now: DateTime<Utc>) {
        self.active_snapshot = Some(snapshot_file_name);
        self.snapshot_time_utc = Some(now);
        self.last_seq = self.last_seq.max(seq);
    }

    /// Advance `last_seq` to at least `seq`, without touching the
    /// snapshot fields. Called after WAL replay brings a database past
    /// its last snapshot.
    pub fn advance_seq(&mut self, seq: u64) {
        self.last_seq = self.last_seq.max(seq);
    }
}

/// Read the manifest at `path`. A missing file means a brand new
/// database (spec.md §4.5 step 0).
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::empty()),
        Err(err) => Err(err.into()),
    }
}

/// Persist `manifest` to `path` atomically: write to a temp file, fsync,
/// then rename over the destination.
pub fn write_manifest(path: impl AsRef<Path>, manifest: &Manifest) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&temp_path)?;
        let bytes = serde_json::to_vec_pretty(manifest)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = read_manifest(dir.path().join("manifest.json")).unwrap();
        assert_eq!(manifest, Manifest::empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::empty();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap();
        manifest.record_snapshot("snapshot-10".to_string(), 10, now);
        write_manifest(&path, &manifest).unwrap();
        let read_back = read_manifest(&path).unwrap();
        assert_eq!(read_back, manifest);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn advance_seq_never_decreases() {
        let mut manifest = Manifest::empty();
        manifest.last_seq = 5;
        manifest.advance_seq(3);
        assert_eq!(manifest.last_seq, 5);
        manifest.advance_seq(9);
        assert_eq!(manifest.last_seq, 9);
    }
}
