//! WAL replay (spec.md §4.4 Failure clause: "a crash mid-append leaves at
//! most one trailing malformed record, which replay must discard without
//! failing recovery").

use super::record::WalRecord;
use peacedb_core::Result;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Outcome of replaying a WAL file.
#[derive(Debug, Default)]
pub struct WalReplay {
    /// Records successfully parsed, in file order.
    pub records: Vec<WalRecord>,
    /// Whether a trailing malformed line was found and discarded.
    pub truncated_tail: bool,
}

/// Read every record out of the WAL at `path`. Missing file is treated as
/// an empty WAL (a fresh database has none yet).
pub fn replay(path: impl AsRef<Path>) -> Result<WalReplay> {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(WalReplay::default()),
        Err(err) => return Err(err.into()),
    };
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut truncated_tail = false;
    let lines: Vec<_> = reader.lines().collect::<std::io::Result<_>>()?;
    let last_index = lines.len().saturating_sub(1);
    for (index, line) in lines.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                if index == last_index {
                    warn!(error = %err, "discarding malformed trailing WAL record");
                    truncated_tail = true;
                } else {
                    return Err(peacedb_core::Error::RecoveryCorruption(format!(
                        "malformed WAL record at line {index}: {err}"
                    )));
                }
            }
        }
    }
    Ok(WalReplay { records, truncated_tail })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::mode::DurabilityMode;
    use crate::wal::writer::WalWriter;
    use peacedb_core::Document;
    use std::collections::BTreeMap;
    use std::io::Write as _;

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
    fn missing_file_replays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let replay = replay(dir.path().join("missing.log")).unwrap();
        assert!(replay.records.is_empty());
        assert!(!replay.truncated_tail);
    }

    #[test]
    fn replays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let mut writer = WalWriter::open(&path, DurabilityMode::Strong).unwrap();
        writer.append(&sample_record(1)).unwrap();
        writer.append(&sample_record(2)).unwrap();
        let replay = replay(&path).unwrap();
        assert_eq!(replay.records.len(), 2);
        assert!(!replay.truncated_tail);
        assert_eq!(replay.records[0].seq(), 1);
        assert_eq!(replay.records[1].seq(), 2);
    }

    #[test]
    fn discards_malformed_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut writer = WalWriter::open(&path, DurabilityMode::Strong).unwrap();
            writer.append(&sample_record(1)).unwrap();
        }
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"op\":\"put\",\"id\":").unwrap();

        let replay = replay(&path).unwrap();
        assert_eq!(replay.records.len(), 1);
        assert!(replay.truncated_tail);
    }
}
