//! Snapshot file format: a line-delimited dump of every document head,
//! written atomically via write-temp-then-rename.

use peacedb_core::{Document, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Write every document in `heads` to `path` as one JSON object per line,
/// then atomically rename a temp file into place so a crash mid-write
/// never leaves a partially-written snapshot visible at `path`.
pub fn write_snapshot(path: impl AsRef<Path>, heads: &[Document]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&temp_path)?;
        for doc in heads {
            let mut line = serde_json::to_vec(doc)?;
            line.push(b'\n');
            file.write_all(&line)?;
        }
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

/// Read back every document head from a snapshot file written by
/// [`write_snapshot`]. A missing file is an empty snapshot (spec.md §4.5:
/// a database with no snapshot yet recovers from WAL alone).
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let reader = BufReader::new(file);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(docs)
}
