//! The Shard Client abstraction (spec.md §4.8): a uniform facade over a
//! colocated or remote File Engine.

use crate::wire::{Command, Output, Request, Response};
use async_trait::async_trait;
use peacedb_core::{Document, Error, Result};
use peacedb_index::NumericRange;
use peacedb_storage::FileStorageEngine;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stats payload returned by [`ShardClient::stats`] (spec.md §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ShardStats {
    /// Database name.
    pub db: String,
    /// Current sequence number.
    pub seq: u64,
    /// Total heads, alive or tombstoned.
    pub docs_total: usize,
    /// Live (non-tombstoned) heads.
    pub docs_alive: usize,
    /// Tombstoned heads.
    pub docs_deleted: usize,
    /// Distinct equality-indexed field paths.
    pub eq_index_fields: usize,
    /// Distinct tags in the tag index.
    pub tag_index_count: usize,
    /// Distinct full-text tokens.
    pub full_text_tokens: usize,
}

/// Everything a Replica Set or Coordinator needs from a replica,
/// regardless of whether it is colocated (`Local`) or remote
/// (`Remote`) (spec.md §4.8).
#[async_trait]
pub trait ShardClient: Send + Sync {
    /// `healthCheck` — true if the replica can serve requests.
    async fn health_check(&self) -> bool;

    /// `createDb(db)`.
    async fn create_db(&self, db: &str) -> Result<()>;

    /// `deleteDb(db)`.
    async fn delete_db(&self, db: &str) -> Result<()>;

    /// `get(db, id, rev?)`.
    async fn get(&self, db: &str, id: &str, rev: Option<&str>) -> Result<Option<Document>>;

    /// `put(db, doc)`.
    async fn put(&self, db: &str, doc: Document) -> Result<Document>;

    /// `post(db, doc)`.
    async fn post(&self, db: &str, doc: Document) -> Result<Document>;

    /// `delete(db, id, rev)`.
    async fn delete(&self, db: &str, id: &str, rev: &str) -> Result<Document>;

    /// `allDocs(db, skip, limit, includeDeleted)`.
    async fn all_docs(&self, db: &str, skip: usize, limit: usize, include_deleted: bool) -> Result<Vec<Document>>;

    /// `findByFields(db, equals?, numericRange?, skip, limit)`.
    async fn find_by_fields(
        &self,
        db: &str,
        equals: &BTreeMap<String, String>,
        range: Option<&NumericRange>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// `findByTags(db, allOf?, anyOf?, noneOf?, skip, limit)`.
    async fn find_by_tags(
        &self,
        db: &str,
        all_of: &[String],
        any_of: &[String],
        none_of: &[String],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// `fullTextSearch(db, query, skip, limit)`.
    async fn full_text_search(&self, db: &str, query: &str, skip: usize, limit: usize) -> Result<Vec<Document>>;

    /// `seq(db)`. An empty `db` is a node-level probe used by the
    /// Health Monitor and Leader Election (spec.md §4.10, §4.11): it
    /// returns the highest seq across every database this replica
    /// hosts, rather than erroring on an unknown database name.
    async fn seq(&self, db: &str) -> Result<u64>;

    /// `stats(db)`.
    async fn stats(&self, db: &str) -> Result<ShardStats>;

    /// `promote()` — tell this replica it is now primary (spec.md §4.11
    /// step 6, §6.2). Election notification errors are ignored by the
    /// caller; the replica's self-state corrects on the next health
    /// cycle either way.
    async fn promote(&self) -> Result<()>;

    /// `setPrimary(primaryUrl)` — tell this replica who the current
    /// primary is, broadcast by the coordinator to every surviving
    /// replica after a failover (spec.md §4.12).
    async fn set_primary(&self, primary_url: &str) -> Result<()>;

    /// A stable address used for client-cache keying and log messages
    /// (e.g. `local://shard-0-primary`, `http://host:port`).
    fn address(&self) -> &str;
}

/// An in-process shard client calling directly into a colocated,
/// multi-database File Storage Engine (spec.md §4.8 "no network, no
/// serialization"). One `LocalShardClient` stands in for one (shard,
/// replica) node; the `db` argument on every call picks which of that
/// node's databases to act on, same as a [`RemoteShardClient`] would
/// pick over the wire.
pub struct LocalShardClient {
    address: String,
    engine: Arc<FileStorageEngine>,
}

impl LocalShardClient {
    /// Wrap `engine` as a local shard client identified by `address`.
    pub fn new(address: impl Into<String>, engine: Arc<FileStorageEngine>) -> Self {
        Self { address: address.into(), engine }
    }

    fn handle(&self, db: &str) -> Result<Arc<peacedb_storage::FileEngineHandle>> {
        self.engine.get_db(db).ok_or_else(|| Error::NotFound(format!("database {db}")))
    }
}

#[async_trait]
impl ShardClient for LocalShardClient {
    async fn health_check(&self) -> bool {
        true
    }

    async fn create_db(&self, db: &str) -> Result<()> {
        self.engine.create_db(db).map(|_| ())
    }

    async fn delete_db(&self, db: &str) -> Result<()> {
        self.engine.delete_db(db)
    }

    async fn get(&self, db: &str, id: &str, rev: Option<&str>) -> Result<Option<Document>> {
        Ok(self.handle(db)?.get(id, rev))
    }

    async fn put(&self, db: &str, doc: Document) -> Result<Document> {
        self.handle(db)?.put(doc)
    }

    async fn post(&self, db: &str, doc: Document) -> Result<Document> {
        self.handle(db)?.post(doc)
    }

    async fn delete(&self, db: &str, id: &str, rev: &str) -> Result<Document> {
        self.handle(db)?.delete(id, rev)
    }

    async fn all_docs(&self, db: &str, skip: usize, limit: usize, include_deleted: bool) -> Result<Vec<Document>> {
        Ok(self.handle(db)?.all_docs(skip, limit, include_deleted))
    }

    async fn find_by_fields(
        &self,
        db: &str,
        equals: &BTreeMap<String, String>,
        range: Option<&NumericRange>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        Ok(self.handle(db)?.find_by_fields(equals, range, skip, limit))
    }

    async fn find_by_tags(
        &self,
        db: &str,
        all_of: &[String],
        any_of: &[String],
        none_of: &[String],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        Ok(self.handle(db)?.find_by_tags(all_of, any_of, none_of, skip, limit))
    }

    async fn full_text_search(&self, db: &str, query: &str, skip: usize, limit: usize) -> Result<Vec<Document>> {
        Ok(self.handle(db)?.full_text_search(query, skip, limit))
    }

    async fn seq(&self, db: &str) -> Result<u64> {
        if db.is_empty() {
            return Ok(self.engine.db_names().iter().filter_map(|name| self.engine.get_db(name)).map(|h| h.seq()).max().unwrap_or(0));
        }
        Ok(self.handle(db)?.seq())
    }

    async fn stats(&self, db: &str) -> Result<ShardStats> {
        let handle = self.handle(db)?;
        let (total, alive, deleted) = handle.doc_counts();
        let (eq_fields, tags, tokens) = handle.with_indexes(|idx| {
            (idx.equality.len(), idx.tag.len(), idx.fulltext.len())
        });
        Ok(ShardStats {
            db: db.to_string(),
            seq: handle.seq(),
            docs_total: total,
            docs_alive: alive,
            docs_deleted: deleted,
            eq_index_fields: eq_fields,
            tag_index_count: tags,
            full_text_tokens: tokens,
        })
    }

    async fn promote(&self) -> Result<()> {
        // A local replica has no separate process identity to notify;
        // its primary/replica role lives entirely in the coordinator's
        // `ReplicaSet`, which `ReplicaSet::promote_to_primary` already
        // updated.
        Ok(())
    }

    async fn set_primary(&self, _primary_url: &str) -> Result<()> {
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// A shard client that speaks the §6.2 wire protocol over a TCP
/// connection to another process running the same service. One JSON
/// line per request, one JSON line per response.
pub struct RemoteShardClient {
    address: String,
    target: String,
    request_counter: std::sync::atomic::AtomicU64,
}

impl RemoteShardClient {
    /// A client that will dial `target` (a `host:port` string) on every
    /// call, identified by `address` for logging/caching purposes.
    pub fn new(address: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            target: target.into(),
            request_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        let n = self.request_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}-{n}", self.address)
    }

    async fn call(&self, command: Command) -> Result<Output> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpStream;

        let mut stream = TcpStream::connect(&self.target)
            .await
            .map_err(|err| Error::Transport(format!("connecting to {}: {err}", self.target)))?;

        let request = Request { id: self.next_id(), command };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        stream
            .write_all(&line)
            .await
            .map_err(|err| Error::Transport(format!("writing to {}: {err}", self.target)))?;

        let (read_half, _write_half) = stream.split();
        let mut reader = BufReader::new(read_half);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|err| Error::Transport(format!("reading from {}: {err}", self.target)))?;
        if response_line.is_empty() {
            return Err(Error::Transport(format!("connection to {} closed with no reply", self.target)));
        }
        let response: Response = serde_json::from_str(&response_line)?;
        match (response.ok, response.result, response.error) {
            (true, Some(output), _) => Ok(output),
            (false, _, Some(error)) => Err(match error.code.as_str() {
                "not-found" => Error::NotFound(error.message),
                "conflict" => Error::Conflict(error.message),
                "validation" => Error::Validation(error.message),
                _ => Error::Transport(error.message),
            }),
            _ => Err(Error::Transport("malformed response envelope".to_string())),
        }
    }
}

#[async_trait]
impl ShardClient for RemoteShardClient {
    async fn health_check(&self) -> bool {
        matches!(self.call(Command::HealthCheck).await, Ok(Output::Health { ok: true }))
    }

    async fn create_db(&self, db: &str) -> Result<()> {
        self.call(Command::CreateDb { db: db.to_string() }).await.map(|_| ())
    }

    async fn delete_db(&self, db: &str) -> Result<()> {
        self.call(Command::DeleteDb { db: db.to_string() }).await.map(|_| ())
    }

    async fn get(&self, db: &str, id: &str, rev: Option<&str>) -> Result<Option<Document>> {
        let output = self
            .call(Command::Get { db: db.to_string(), id: id.to_string(), rev: rev.map(str::to_string) })
            .await?;
        match output {
            Output::Doc { doc } => Ok(doc),
            _ => Err(Error::Transport("unexpected response to get".to_string())),
        }
    }

    async fn put(&self, db: &str, doc: Document) -> Result<Document> {
        match self.call(Command::Put { db: db.to_string(), doc }).await? {
            Output::Doc { doc: Some(doc) } => Ok(doc),
            _ => Err(Error::Transport("unexpected response to put".to_string())),
        }
    }

    async fn post(&self, db: &str, doc: Document) -> Result<Document> {
        match self.call(Command::Post { db: db.to_string(), doc }).await? {
            Output::Doc { doc: Some(doc) } => Ok(doc),
            _ => Err(Error::Transport("unexpected response to post".to_string())),
        }
    }

    async fn delete(&self, db: &str, id: &str, rev: &str) -> Result<Document> {
        match self
            .call(Command::Delete { db: db.to_string(), id: id.to_string(), rev: rev.to_string() })
            .await?
        {
            Output::Doc { doc: Some(doc) } => Ok(doc),
            _ => Err(Error::Transport("unexpected response to delete".to_string())),
        }
    }

    async fn all_docs(&self, db: &str, skip: usize, limit: usize, include_deleted: bool) -> Result<Vec<Document>> {
        match self
            .call(Command::AllDocs { db: db.to_string(), skip, limit, include_deleted })
            .await?
        {
            Output::Docs { docs } => Ok(docs),
            _ => Err(Error::Transport("unexpected response to allDocs".to_string())),
        }
    }

    async fn find_by_fields(
        &self,
        db: &str,
        equals: &BTreeMap<String, String>,
        range: Option<&NumericRange>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        match self
            .call(Command::FindByFields {
                db: db.to_string(),
                equals: equals.clone(),
                numeric_range: range.cloned(),
                skip,
                limit,
            })
            .await?
        {
            Output::Docs { docs } => Ok(docs),
            _ => Err(Error::Transport("unexpected response to findByFields".to_string())),
        }
    }

    async fn find_by_tags(
        &self,
        db: &str,
        all_of: &[String],
        any_of: &[String],
        none_of: &[String],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        match self
            .call(Command::FindByTags {
                db: db.to_string(),
                all_of: all_of.to_vec(),
                any_of: any_of.to_vec(),
                none_of: none_of.to_vec(),
                skip,
                limit,
            })
            .await?
        {
            Output::Docs { docs } => Ok(docs),
            _ => Err(Error::Transport("unexpected response to findByTags".to_string())),
        }
    }

    async fn full_text_search(&self, db: &str, query: &str, skip: usize, limit: usize) -> Result<Vec<Document>> {
        match self
            .call(Command::FullTextSearch { db: db.to_string(), query: query.to_string(), skip, limit })
            .await?
        {
            Output::Docs { docs } => Ok(docs),
            _ => Err(Error::Transport("unexpected response to fullTextSearch".to_string())),
        }
    }

    async fn seq(&self, db: &str) -> Result<u64> {
        match self.call(Command::Seq { db: db.to_string() }).await? {
            Output::Seq { seq } => Ok(seq),
            _ => Err(Error::Transport("unexpected response to seq".to_string())),
        }
    }

    async fn stats(&self, db: &str) -> Result<ShardStats> {
        match self.call(Command::Stats { db: db.to_string() }).await? {
            Output::Stats {
                db,
                seq,
                docs_total,
                docs_alive,
                docs_deleted,
                eq_index_fields,
                tag_index_count,
                full_text_tokens,
            } => Ok(ShardStats {
                db,
                seq,
                docs_total,
                docs_alive,
                docs_deleted,
                eq_index_fields,
                tag_index_count,
                full_text_tokens,
            }),
            _ => Err(Error::Transport("unexpected response to stats".to_string())),
        }
    }

    async fn promote(&self) -> Result<()> {
        self.call(Command::Promote).await.map(|_| ())
    }

    async fn set_primary(&self, primary_url: &str) -> Result<()> {
        self.call(Command::SetPrimary { primary_url: primary_url.to_string() }).await.map(|_| ())
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peacedb_storage::StorageConfig;
    use std::collections::BTreeMap as Map;

    fn test_engine(dir: &std::path::Path) -> Arc<FileStorageEngine> {
        Arc::new(FileStorageEngine::open(StorageConfig::new(dir)).unwrap())
    }

    fn sample_doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            rev: None,
            deleted: false,
            data: Map::new(),
            tags: vec![],
            content: None,
        }
    }

    #[tokio::test]
    async fn local_client_round_trips_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path());
        engine.create_db("app").unwrap();
        let client = LocalShardClient::new("local://shard-0-primary", engine);

        assert!(client.health_check().await);
        let created = client.post("app", sample_doc("")).await.unwrap();
        let fetched = client.get("app", &created.id, None).await.unwrap();
        assert_eq!(fetched, Some(created));
        assert_eq!(client.address(), "local://shard-0-primary");
    }

    #[tokio::test]
    async fn local_client_create_db_is_lazy_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path());
        let client = LocalShardClient::new("local://shard-0-primary", engine);

        client.create_db("app").await.unwrap();
        client.create_db("app").await.unwrap();
        assert!(client.get("app", "missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_client_seq_of_unknown_db_errors_but_empty_db_probes_node() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path());
        engine.create_db("app").unwrap();
        let client = LocalShardClient::new("local://shard-0-primary", engine);
        client.post("app", sample_doc("")).await.unwrap();

        assert!(client.seq("nope").await.is_err());
        assert_eq!(client.seq("").await.unwrap(), 1);
    }
}
