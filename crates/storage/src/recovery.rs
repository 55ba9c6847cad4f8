//! Recovery protocol (spec.md §4.5 "Recovery protocol"): manifest then
//! snapshot then WAL replay, per database directory.

use peacedb_core::{Document, Error, Result};
use peacedb_durability::{read_manifest, read_snapshot, replay, DatabasePaths, Manifest, WalRecord};
use peacedb_engine::Database;
use tracing::{info, warn};

/// Recover a single database's in-memory state from its on-disk files and
/// return the manifest recovery settled on (its `last_seq` may be higher
/// than what was on disk if the WAL contained later records).
pub fn recover_one(db: &Database, paths: &DatabasePaths) -> Result<Manifest> {
    let mut manifest = read_manifest(paths.manifest_file())?;

    if let Some(snapshot_name) = manifest.active_snapshot.clone() {
        let snapshot_path = paths.root().join(&snapshot_name);
        match read_snapshot(&snapshot_path) {
            Ok(heads) => {
                for doc in heads {
                    db.import(doc, true, true, false);
                }
            }
            Err(err) => {
                warn!(error = %err, path = %snapshot_path.display(), "failed to read snapshot, continuing from WAL alone");
            }
        }
    }

    let wal_replay = replay(paths.wal_file())?;
    if wal_replay.truncated_tail {
        warn!(db = %paths.root().display(), "discarded malformed trailing WAL record during recovery");
    }

    let mut last_seq = manifest.last_seq;
    for record in wal_replay.records {
        if record.seq() <= last_seq {
            continue;
        }
        let record_seq = record.seq();
        apply_record(db, record)?;
        last_seq = last_seq.max(record_seq);
    }

    manifest.advance_seq(last_seq);
    db.set_seq(manifest.last_seq);

    info!(
        db = %paths.root().display(),
        seq = manifest.last_seq,
        "recovered database"
    );
    Ok(manifest)
}

fn apply_record(db: &Database, record: WalRecord) -> Result<()> {
    match record {
        WalRecord::Put { doc, .. } => {
            db.import(doc, true, true, true);
            Ok(())
        }
        WalRecord::Delete { id, rev, .. } => match db.delete(&id, &rev) {
            Ok(_) => Ok(()),
            Err(Error::NotFound(_)) | Err(Error::Conflict(_)) => {
                // The head at time of logging may already reflect this
                // delete via a snapshot taken after it; re-applying a
                // delete that already landed is not an error during
                // recovery.
                Ok(())
            }
            Err(err) => Err(err),
        },
    }
}

/// Import a document during recovery, bypassing `Database::put`'s
/// conflict checks entirely. Exposed for callers that stream snapshot
/// documents directly rather than going through [`recover_one`].
pub fn import_snapshot_doc(db: &Database, doc: Document) {
    db.import(doc, true, true, false);
}
