//! The inter-process replica wire protocol: a text request/response
//! protocol, `{id, op, params}` requests answered by `{id, ok,
//! result|error}` responses.

use peacedb_core::Document;
use peacedb_index::NumericRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One logical RPC call to a replica (spec.md §6.2 endpoint list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    /// `healthCheck`.
    HealthCheck,
    /// `createDb(db)`.
    CreateDb { db: String },
    /// `deleteDb(db)`.
    DeleteDb { db: String },
    /// `get(db, id, rev?)`.
    Get { db: String, id: String, rev: Option<String> },
    /// `put(db, doc)`.
    Put { db: String, doc: Document },
    /// `post(db, doc)`.
    Post { db: String, doc: Document },
    /// `delete(db, id, rev)`.
    Delete { db: String, id: String, rev: String },
    /// `allDocs(db, skip, limit, includeDeleted)`.
    AllDocs { db: String, skip: usize, limit: usize, include_deleted: bool },
    /// `seq(db)`.
    Seq { db: String },
    /// `stats(db)`.
    Stats { db: String },
    /// `findByFields(db, equals?, numericRange?, skip, limit)`.
    FindByFields {
        db: String,
        equals: BTreeMap<String, String>,
        numeric_range: Option<NumericRange>,
        skip: usize,
        limit: usize,
    },
    /// `findByTags(db, allOf?, anyOf?, noneOf?, skip, limit)`.
    FindByTags {
        db: String,
        all_of: Vec<String>,
        any_of: Vec<String>,
        none_of: Vec<String>,
        skip: usize,
        limit: usize,
    },
    /// `fullTextSearch(db, query, skip, limit)`.
    FullTextSearch { db: String, query: String, skip: usize, limit: usize },
    /// `getReplicationState()`.
    GetReplicationState,
    /// `replicate(entry)`.
    Replicate { entry: ReplicationEntry },
    /// `replicateBatch([entry])`.
    ReplicateBatch { entries: Vec<ReplicationEntry> },
    /// `promote()`.
    Promote,
    /// `setPrimary(primaryUrl)`.
    SetPrimary { primary_url: String },
    /// `getWalEntries(db, fromSeq, limit)`.
    GetWalEntries { db: String, from_seq: u64, limit: usize },
}

/// `ReplicationEntry` (spec.md §6.2): one operation forwarded from a
/// primary to a replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationEntry {
    /// Which operation this entry replays.
    pub op: ReplicationOp,
    /// Target database.
    pub db: String,
    /// Document id, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Revision produced by the operation, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Sequence number this entry advanced the database to.
    pub seq: u64,
    /// Document payload, for `put`/`post`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
    /// Origination timestamp, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Kinds of operation a [`ReplicationEntry`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplicationOp {
    /// Create a database.
    CreateDb,
    /// Delete a database.
    DeleteDb,
    /// Put (create-or-update) a document.
    Put,
    /// Post (create with generated id) a document.
    Post,
    /// Delete (tombstone) a document.
    Delete,
}

/// Result of a successful or failed [`Command`] (the response half of the
/// wire envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Output {
    /// `healthCheck` result.
    Health { ok: bool },
    /// A single document, or none.
    Doc { doc: Option<Document> },
    /// A page of documents.
    Docs { docs: Vec<Document> },
    /// A sequence number.
    Seq { seq: u64 },
    /// Stats payload (spec.md §4.8 `Stats`).
    Stats {
        db: String,
        seq: u64,
        docs_total: usize,
        docs_alive: usize,
        docs_deleted: usize,
        eq_index_fields: usize,
        tag_index_count: usize,
        full_text_tokens: usize,
    },
    /// Replication state (spec.md §6.2 `getReplicationState`).
    ReplicationState {
        healthy: bool,
        is_primary: bool,
        seq: u64,
        wal_position: Option<u64>,
        uptime_seconds: u64,
        current_primary_url: Option<String>,
        replication_lag: Option<u64>,
        last_sync_at: Option<String>,
    },
    /// No payload beyond success (e.g. `createDb`, `promote`).
    Ack,
    /// A batch of WAL entries (`getWalEntries`).
    WalEntries { entries: Vec<ReplicationEntry> },
}

/// A framed request: `{id, op-tagged command}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlates a response back to its request.
    pub id: String,
    /// The command being invoked.
    #[serde(flatten)]
    pub command: Command,
}

/// A framed response: success carries `result`; failure carries `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Echoes the request id.
    pub id: String,
    /// Whether the call succeeded.
    pub ok: bool,
    /// Present when `ok` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Output>,
    /// Present when `ok` is false: `{code, message}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// An error surfaced over the wire (spec.md §7 error kinds, flattened to
/// a code + message for transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    /// One of the §7 error kind names (`validation`, `not-found`, ...).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl Response {
    /// Build a success response.
    pub fn ok(id: String, result: Output) -> Self {
        Self { id, ok: true, result: Some(result), error: None }
    }

    /// Build a failure response.
    pub fn err(id: String, code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(WireError { code: code.to_string(), message: message.into() }),
        }
    }
}

impl From<&peacedb_core::Error> for WireError {
    fn from(err: &peacedb_core::Error) -> Self {
        let code = match err {
            peacedb_core::Error::Validation(_) => "validation",
            peacedb_core::Error::NotFound(_) => "not-found",
            peacedb_core::Error::Conflict(_) => "conflict",
            peacedb_core::Error::QuorumUnavailable { .. } => "quorum-unavailable",
            peacedb_core::Error::PartialWrite { .. } => "partial-write",
            peacedb_core::Error::Transport(_) => "transport",
            peacedb_core::Error::ElectionFailed { .. } => "election-failed",
            peacedb_core::Error::RecoveryCorruption(_) => "recovery-corruption",
            peacedb_core::Error::Io(_) => "transport",
            peacedb_core::Error::Serialization(_) => "validation",
        };
        WireError { code: code.to_string(), message: err.to_string() }
    }
}
