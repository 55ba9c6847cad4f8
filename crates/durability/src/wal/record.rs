//! The WAL record shape (spec.md §4.4): one self-describing JSON value per
//! line, so a reader can stop at the first malformed line without needing
//! a framing length prefix.

use peacedb_core::Document;
use serde::{Deserialize, Serialize};

/// One logical mutation recorded in the WAL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WalRecord {
    /// A document was created or updated; `doc` carries the full new head.
    Put {
        /// Document id.
        id: String,
        /// Revision assigned to this write.
        rev: String,
        /// Database sequence number this write produced.
        seq: u64,
        /// The new head, including its tombstone flag.
        doc: Document,
        /// UTC timestamp, RFC 3339.
        ts: String,
    },
    /// A document was soft-deleted. Carried separately from `Put` so a
    /// reader can distinguish tombstones without inspecting `doc.deleted`.
    Delete {
        /// Document id.
        id: String,
        /// Revision assigned to the tombstone.
        rev: String,
        /// Database sequence number this write produced.
        seq: u64,
        /// UTC timestamp, RFC 3339.
        ts: String,
    },
}

impl WalRecord {
    /// The sequence number this record advanced the database to.
    pub fn seq(&self) -> u64 {
        match self {
            WalRecord::Put { seq, .. } => *seq,
            WalRecord::Delete { seq, .. } => *seq,
        }
    }

    /// The id of the document this record mutated.
    pub fn id(&self) -> &str {
        match self {
            WalRecord::Put { id, .. } => id,
            WalRecord::Delete { id, .. } => id,
        }
    }
}
