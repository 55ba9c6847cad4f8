//! Append-only WAL writer: one JSON line per record, with a per-append
//! durability mode governing how aggressively the write is flushed.

use super::mode::DurabilityMode;
use super::record::WalRecord;
use peacedb_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Appends [`WalRecord`]s to a single growing log file, fsyncing according
/// to the configured [`DurabilityMode`].
pub struct WalWriter {
    file: File,
    path: PathBuf,
    mode: DurabilityMode,
    writes_since_sync: usize,
    last_sync: Instant,
}

impl WalWriter {
    /// Open (creating if absent) the WAL file at `path` for appending.
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file,
            path,
            mode,
            writes_since_sync: 0,
            last_sync: Instant::now(),
        })
    }

    /// Append one record, writing a single `\n`-terminated JSON line.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.writes_since_sync += 1;
        self.maybe_sync()?;
        Ok(())
    }

    fn maybe_sync(&mut self) -> Result<()> {
        match self.mode {
            DurabilityMode::Relaxed => Ok(()),
            DurabilityMode::Strong => self.sync(),
            DurabilityMode::Commit { batch_size, interval_ms } => {
                let elapsed = self.last_sync.elapsed().as_millis() as u64;
                if self.writes_since_sync >= batch_size || elapsed >= interval_ms {
                    self.sync()
                } else {
                    Ok(())
                }
            }
        }
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data().map_err(Error::Io)?;
        self.writes_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Force an fsync regardless of mode. Used before rotation/snapshot
    /// (spec.md §4.5: a snapshot must not leave unflushed WAL bytes behind).
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(Error::Io)?;
        self.sync()
    }

    /// The path this writer is appending to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the WAL to empty and reset write counters. Used after a
    /// snapshot makes the prior WAL contents redundant (spec.md §4.5
    /// rotation-on-snapshot).
    pub fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.writes_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use peacedb_core::Document;

    fn sample_record(seq: u64) -> WalRecord {
        WalRecord::Put {
            id: "a".to_string(),
            rev: format!("{seq}-x"),
            seq,
            doc: Document {
                id: "a".to_string(),
                rev: Some(format!("{seq}-x")),
                deleted: false,
                data: BTreeMap::new(),
                tags: vec![],
                content: None,
            },
            ts: "2026-07-28T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn appends_are_newline_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut writer = WalWriter::open(&path, DurabilityMode::Strong).unwrap();
        writer.append(&sample_record(1)).unwrap();
        writer.append(&sample_record(2)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn rotate_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut writer = WalWriter::open(&path, DurabilityMode::Strong).unwrap();
        writer.append(&sample_record(1)).unwrap();
        writer.rotate().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.is_empty());
    }
}
