//! The Replicated Document Service: the top-level implementation of the
//! document-service contract, composing the [`ShardRouter`] and
//! [`ReplicationCoordinator`] to route writes with quorum, load-balance
//! reads, and scatter-gather cross-shard queries.

use crate::config::ReplicationConfig;
use peacedb_core::{Document, Error, Result};
use peacedb_index::NumericRange;
use peacedb_replication::ReplicationCoordinator;
use peacedb_sharding::{ShardClient, ShardRouter, ShardStats};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

/// Routes and replicates document operations across every shard's replica
/// set (spec.md §4.13).
pub struct ReplicatedDocumentService {
    router: ShardRouter,
    coordinator: Arc<ReplicationCoordinator>,
    write_quorum: usize,
}

impl ReplicatedDocumentService {
    /// Build a service over an already-initialized router and coordinator,
    /// requiring at least `write_quorum` replica acknowledgements per
    /// write (spec.md §6.4 `WriteQuorum`).
    pub fn new(router: ShardRouter, coordinator: Arc<ReplicationCoordinator>, write_quorum: usize) -> Self {
        Self { router, coordinator, write_quorum }
    }

    /// Build a service from a [`crate::topology::Topology`] and the
    /// replication config it was built from.
    pub fn from_topology(topology: &crate::topology::Topology, replication: &ReplicationConfig) -> Self {
        Self::new(topology.router.clone(), topology.coordinator.clone(), replication.write_quorum)
    }

    fn read_clients_shuffled(&self, shard_id: u32) -> Vec<Arc<dyn ShardClient>> {
        let mut clients = self.coordinator.get_read_clients(shard_id);
        clients.shuffle(&mut rand::thread_rng());
        clients
    }

    // -----------------------------------------------------------------
    // Write path (spec.md §4.13 "Write path")
    // -----------------------------------------------------------------

    /// `Put` a document with its current rev (update) or no rev (create).
    pub async fn put(&self, db: &str, doc: Document) -> Result<Document> {
        let shard_id = self.router.shard_id(&doc.id);
        let db = db.to_string();
        self.quorum_write(shard_id, move |client| {
            let db = db.clone();
            let doc = doc.clone();
            async move { client.put(&db, doc).await }
        })
        .await
    }

    /// `Post` a document, assigning a server id before routing if the
    /// caller supplied none (spec.md §4.13 step 1).
    pub async fn post(&self, db: &str, mut doc: Document) -> Result<Document> {
        if doc.id.is_empty() {
            doc.id = uuid::Uuid::new_v4().to_string();
        }
        let shard_id = self.router.shard_id(&doc.id);
        let db = db.to_string();
        self.quorum_write(shard_id, move |client| {
            let db = db.clone();
            let doc = doc.clone();
            async move { client.post(&db, doc).await }
        })
        .await
    }

    /// `Delete` (tombstone) a document at its current rev.
    pub async fn delete(&self, db: &str, id: &str, rev: &str) -> Result<Document> {
        let shard_id = self.router.shard_id(id);
        let db = db.to_string();
        let id = id.to_string();
        let rev = rev.to_string();
        self.quorum_write(shard_id, move |client| {
            let db = db.clone();
            let id = id.clone();
            let rev = rev.clone();
            async move { client.delete(&db, &id, &rev).await }
        })
        .await
    }

    /// Fan a write out to every write target of `shard_id`, returning as
    /// soon as `write_quorum` replicas have accepted it (spec.md §4.13
    /// steps 2-6, §9 "Fan-out quorum wait"). Late responses are drained in
    /// the background rather than awaited.
    async fn quorum_write<F, Fut>(&self, shard_id: u32, op: F) -> Result<Document>
    where
        F: Fn(Arc<dyn ShardClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Document>> + Send + 'static,
    {
        let clients = self.coordinator.get_write_clients(shard_id);
        if clients.len() < self.write_quorum {
            return Err(Error::QuorumUnavailable { needed: self.write_quorum, available: clients.len() });
        }
        let attempted = clients.len();
        let op = Arc::new(op);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for client in clients {
            let tx = tx.clone();
            let op = op.clone();
            tokio::spawn(async move {
                let result = op(client).await;
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut successes = Vec::new();
        let mut errors = Vec::new();
        while let Some(result) = rx.recv().await {
            match result {
                Ok(doc) => {
                    successes.push(doc);
                    if successes.len() >= self.write_quorum {
                        tokio::spawn(async move { while rx.recv().await.is_some() {} });
                        return Ok(successes.remove(0));
                    }
                }
                Err(err) => {
                    warn!(shard_id, error = %err, "write replica failed during quorum fan-out");
                    errors.push(err.to_string());
                }
            }
        }
        warn!(
            shard_id,
            attempted,
            successes = successes.len(),
            "quorum write failed to reach write_quorum acknowledgements"
        );
        Err(Error::PartialWrite { successes: successes.len(), attempted, errors })
    }

    // -----------------------------------------------------------------
    // Read path (spec.md §4.13 "Read path")
    // -----------------------------------------------------------------

    /// `Get` a document, load-balanced across read targets with
    /// in-order fallback on failure (spec.md §4.13 steps 1-3).
    pub async fn get(&self, db: &str, id: &str, rev: Option<&str>) -> Result<Option<Document>> {
        let shard_id = self.router.shard_id(id);
        let clients = self.read_clients_shuffled(shard_id);
        let db = db.to_string();
        let id = id.to_string();
        let rev = rev.map(str::to_string);
        match read_with_fallback(clients, move |c| {
            let db = db.clone();
            let id = id.clone();
            let rev = rev.clone();
            async move { c.get(&db, &id, rev.as_deref()).await }
        })
        .await
        {
            Ok(doc) => Ok(doc),
            Err(_) => Ok(None),
        }
    }

    // -----------------------------------------------------------------
    // Scatter-gather path (spec.md §4.13 "Scatter-gather path")
    // -----------------------------------------------------------------

    /// `AllDocs` across every shard, merged and paginated by id.
    pub async fn all_docs(&self, db: &str, skip: usize, limit: usize, include_deleted: bool) -> Result<Vec<Document>> {
        let per_shard_limit = skip + limit;
        let docs = self
            .scatter(db, move |c, db| async move { c.all_docs(&db, 0, per_shard_limit, include_deleted).await })
            .await;
        Ok(paginate(docs, skip, limit))
    }

    /// `FindByFields` across every shard, merged and paginated by id.
    pub async fn find_by_fields(
        &self,
        db: &str,
        equals: BTreeMap<String, String>,
        range: Option<NumericRange>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let per_shard_limit = skip + limit;
        let docs = self
            .scatter(db, move |c, db| {
                let equals = equals.clone();
                let range = range.clone();
                async move { c.find_by_fields(&db, &equals, range.as_ref(), 0, per_shard_limit).await }
            })
            .await;
        Ok(paginate(docs, skip, limit))
    }

    /// `FindByTags` across every shard, merged and paginated by id.
    pub async fn find_by_tags(
        &self,
        db: &str,
        all_of: Vec<String>,
        any_of: Vec<String>,
        none_of: Vec<String>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let per_shard_limit = skip + limit;
        let docs = self
            .scatter(db, move |c, db| {
                let all_of = all_of.clone();
                let any_of = any_of.clone();
                let none_of = none_of.clone();
                async move { c.find_by_tags(&db, &all_of, &any_of, &none_of, 0, per_shard_limit).await }
            })
            .await;
        Ok(paginate(docs, skip, limit))
    }

    /// `FullTextSearch` across every shard, merged and paginated by id.
    pub async fn full_text_search(&self, db: &str, query: &str, skip: usize, limit: usize) -> Result<Vec<Document>> {
        let per_shard_limit = skip + limit;
        let query = query.to_string();
        let docs = self
            .scatter(db, move |c, db| {
                let query = query.clone();
                async move { c.full_text_search(&db, &query, 0, per_shard_limit).await }
            })
            .await;
        Ok(paginate(docs, skip, limit))
    }

    /// `Seq`: the max sequence number observed across every shard
    /// (spec.md §4.13 "For `Seq`: return `max` across shards").
    pub async fn seq(&self, db: &str) -> Result<u64> {
        let db = db.to_string();
        let mut joinset = JoinSet::new();
        for shard_id in 0..self.router.shard_count() {
            let clients = self.read_clients_shuffled(shard_id);
            let db = db.clone();
            joinset.spawn(async move { read_with_fallback(clients, move |c| { let db = db.clone(); async move { c.seq(&db).await } }).await.unwrap_or(0) });
        }
        let mut max_seq = 0;
        while let Some(res) = joinset.join_next().await {
            if let Ok(seq) = res {
                max_seq = max_seq.max(seq);
            }
        }
        Ok(max_seq)
    }

    /// `Stats`: per-document counters summed across shards, shard-internal
    /// counters maxed (spec.md §4.13 "For `Stats`: ...").
    pub async fn stats(&self, db: &str) -> Result<ShardStats> {
        let db_name = db.to_string();
        let db_owned = db.to_string();
        let mut joinset = JoinSet::new();
        for shard_id in 0..self.router.shard_count() {
            let clients = self.read_clients_shuffled(shard_id);
            let db = db_owned.clone();
            joinset.spawn(async move { read_with_fallback(clients, move |c| { let db = db.clone(); async move { c.stats(&db).await } }).await.ok() });
        }
        let mut merged = ShardStats {
            db: db_name,
            seq: 0,
            docs_total: 0,
            docs_alive: 0,
            docs_deleted: 0,
            eq_index_fields: 0,
            tag_index_count: 0,
            full_text_tokens: 0,
        };
        while let Some(res) = joinset.join_next().await {
            if let Ok(Some(s)) = res {
                merged.docs_total += s.docs_total;
                merged.docs_alive += s.docs_alive;
                merged.docs_deleted += s.docs_deleted;
                merged.full_text_tokens += s.full_text_tokens;
                merged.seq = merged.seq.max(s.seq);
                merged.eq_index_fields = merged.eq_index_fields.max(s.eq_index_fields);
                merged.tag_index_count = merged.tag_index_count.max(s.tag_index_count);
            }
        }
        Ok(merged)
    }

    /// Run `op` against one shuffled, fallback-retrying read client per
    /// shard in parallel and merge the results by id (spec.md §4.13
    /// "Scatter-gather path" steps 1-3).
    async fn scatter<F, Fut>(&self, db: &str, op: F) -> Vec<Document>
    where
        F: Fn(Arc<dyn ShardClient>, String) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<Vec<Document>>> + Send + 'static,
    {
        let db = db.to_string();
        let mut joinset = JoinSet::new();
        for shard_id in 0..self.router.shard_count() {
            let clients = self.read_clients_shuffled(shard_id);
            let op = op.clone();
            let db = db.clone();
            joinset.spawn(async move { read_with_fallback(clients, move |c| op(c, db.clone())).await.unwrap_or_default() });
        }
        let mut merged = Vec::new();
        while let Some(res) = joinset.join_next().await {
            if let Ok(docs) = res {
                merged.extend(docs);
            }
        }
        merged.sort_by(|a, b| a.id.cmp(&b.id));
        merged
    }

    // -----------------------------------------------------------------
    // Database lifecycle (spec.md §4.13 "Database lifecycle")
    // -----------------------------------------------------------------

    /// `CreateDb`: broadcast to every available replica of every shard;
    /// succeeds if at least one replica accepted it (spec.md §9 open
    /// question resolution; idempotent "already exists" counts as
    /// success because the underlying engine's `create_db` is itself
    /// idempotent).
    pub async fn create_db(&self, db: &str) -> Result<()> {
        self.broadcast(db, |client, db| async move { client.create_db(&db).await }).await
    }

    /// `DeleteDb`: same broadcast-and-any-success semantics as
    /// [`Self::create_db`].
    pub async fn delete_db(&self, db: &str) -> Result<()> {
        self.broadcast(db, |client, db| async move { client.delete_db(&db).await }).await
    }

    async fn broadcast<F, Fut>(&self, db: &str, op: F) -> Result<()>
    where
        F: Fn(Arc<dyn ShardClient>, String) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut joinset = JoinSet::new();
        for shard_id in 0..self.router.shard_count() {
            for client in self.coordinator.get_write_clients(shard_id) {
                let op = op.clone();
                let db = db.to_string();
                joinset.spawn(async move { op(client, db).await });
            }
        }
        let mut any_success = false;
        let mut errors = Vec::new();
        while let Some(res) = joinset.join_next().await {
            match res {
                Ok(Ok(())) => any_success = true,
                Ok(Err(err)) => {
                    warn!(db = %db, error = %err, "broadcast replica failed");
                    errors.push(err.to_string());
                }
                Err(err) => {
                    warn!(db = %db, error = %err, "broadcast replica task panicked or was cancelled");
                    errors.push(err.to_string());
                }
            }
        }
        if any_success {
            Ok(())
        } else {
            warn!(db = %db, attempted = errors.len(), "broadcast failed on every replica");
            Err(Error::PartialWrite { successes: 0, attempted: errors.len(), errors })
        }
    }
}

/// Try `op` against each client in order, returning the first success;
/// errors are swallowed and retried against the next client (spec.md
/// §4.13 read/scatter-gather fallback).
async fn read_with_fallback<T, F, Fut>(clients: Vec<Arc<dyn ShardClient>>, op: F) -> Result<T>
where
    F: Fn(Arc<dyn ShardClient>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for client in clients {
        match op(client).await {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Transport("no read clients available".to_string())))
}

/// Sort-then-slice pagination shared by every scatter-gather operation
/// (spec.md §4.3 "Stable-order pagination").
fn paginate(mut docs: Vec<Document>, skip: usize, limit: usize) -> Vec<Document> {
    docs.sort_by(|a, b| a.id.cmp(&b.id));
    docs.into_iter().skip(skip).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use peacedb_replication::{HealthStatus, Replica, ReplicaSet, ReplicationCoordinator, ReplicationTuning, SyncState};
    use peacedb_sharding::HashAlgorithm;
    use std::collections::BTreeMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeClient {
        address: String,
        healthy: bool,
        seq: u64,
        docs: StdMutex<Map<String, Document>>,
        put_calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(address: &str, healthy: bool, seq: u64) -> Self {
            Self { address: address.to_string(), healthy, seq, docs: StdMutex::new(Map::new()), put_calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ShardClient for FakeClient {
        async fn health_check(&self) -> bool {
            self.healthy
        }
        async fn create_db(&self, _db: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_db(&self, _db: &str) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _db: &str, id: &str, _rev: Option<&str>) -> Result<Option<Document>> {
            Ok(self.docs.lock().unwrap().get(id).cloned())
        }
        async fn put(&self, _db: &str, mut doc: Document) -> Result<Document> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            doc.rev = Some(format!("1-{}", self.address));
            self.docs.lock().unwrap().insert(doc.id.clone(), doc.clone());
            Ok(doc)
        }
        async fn post(&self, _db: &str, mut doc: Document) -> Result<Document> {
            doc.rev = Some(format!("1-{}", self.address));
            self.docs.lock().unwrap().insert(doc.id.clone(), doc.clone());
            Ok(doc)
        }
        async fn delete(&self, _db: &str, id: &str, _rev: &str) -> Result<Document> {
            let mut doc = self.docs.lock().unwrap().get(id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))?;
            doc.deleted = true;
            Ok(doc)
        }
        async fn all_docs(&self, _db: &str, _skip: usize, limit: usize, _include_deleted: bool) -> Result<Vec<Document>> {
            let docs = self.docs.lock().unwrap();
            let mut out: Vec<Document> = docs.values().cloned().collect();
            out.sort_by(|a, b| a.id.cmp(&b.id));
            out.truncate(limit.max(out.len().min(limit)));
            Ok(out)
        }
        async fn find_by_fields(&self, _db: &str, _equals: &Map<String, String>, _range: Option<&NumericRange>, _skip: usize, _limit: usize) -> Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn find_by_tags(&self, _db: &str, _all_of: &[String], _any_of: &[String], _none_of: &[String], _skip: usize, _limit: usize) -> Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn full_text_search(&self, _db: &str, _query: &str, _skip: usize, _limit: usize) -> Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn seq(&self, _db: &str) -> Result<u64> {
            Ok(self.seq)
        }
        async fn stats(&self, db: &str) -> Result<ShardStats> {
            let count = self.docs.lock().unwrap().len();
            Ok(ShardStats {
                db: db.to_string(),
                seq: self.seq,
                docs_total: count,
                docs_alive: count,
                docs_deleted: 0,
                eq_index_fields: 1,
                tag_index_count: 1,
                full_text_tokens: 1,
            })
        }
        async fn promote(&self) -> Result<()> {
            Ok(())
        }
        async fn set_primary(&self, _primary_url: &str) -> Result<()> {
            Ok(())
        }
        fn address(&self) -> &str {
            &self.address
        }
    }

    fn doc(id: &str) -> Document {
        Document { id: id.to_string(), rev: None, deleted: false, data: Map::new(), tags: vec![], content: None }
    }

    fn single_shard_service(write_quorum: usize, replicas: Vec<(&str, bool, u64)>) -> ReplicatedDocumentService {
        let clients = DashMap::new();
        let mut replica_states = Vec::new();
        for (addr, healthy, seq) in replicas {
            clients.insert(addr.to_string(), Arc::new(FakeClient::new(addr, healthy, seq)) as Arc<dyn ShardClient>);
            let mut r = Replica::new(0, replica_states.len() as u32, addr, replica_states.is_empty(), true);
            r.health_status = if healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
            r.sync_state = SyncState::InSync;
            replica_states.push(r);
        }
        let primary = Some(replica_states.remove(0));
        let mut sets = std::collections::BTreeMap::new();
        sets.insert(0, Arc::new(ReplicaSet::new(0, primary, replica_states)));
        let coordinator = Arc::new(ReplicationCoordinator::new(sets, clients, Arc::new(peacedb_replication::EventBus::default()), ReplicationTuning::default()));
        ReplicatedDocumentService::new(ShardRouter::new(1, HashAlgorithm::Xxh3), coordinator, write_quorum)
    }

    #[tokio::test]
    async fn put_succeeds_once_quorum_is_reached() {
        let service = single_shard_service(2, vec![("p", true, 0), ("r1", true, 0), ("r2", true, 0)]);
        let result = service.put("app", doc("x")).await.unwrap();
        assert_eq!(result.id, "x");
        assert!(result.rev.is_some());
    }

    #[tokio::test]
    async fn put_fails_with_quorum_unavailable_when_too_few_replicas_are_up() {
        let service = single_shard_service(3, vec![("p", true, 0), ("r1", false, 0)]);
        let err = service.put("app", doc("x")).await.unwrap_err();
        assert!(matches!(err, Error::QuorumUnavailable { needed: 3, available: 1 }));
    }

    #[tokio::test]
    async fn post_assigns_id_before_routing() {
        let service = single_shard_service(1, vec![("p", true, 0)]);
        let mut blank = doc("");
        blank.id = String::new();
        let result = service.post("app", blank).await.unwrap();
        assert!(!result.id.is_empty());
    }

    #[tokio::test]
    async fn get_returns_none_when_all_reads_fail() {
        let service = single_shard_service(1, vec![("p", false, 0)]);
        // an unhealthy primary still has no client wired into the read set
        let result = service.get("app", "missing", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn scatter_gather_merges_and_paginates_by_id() {
        let clients = DashMap::new();
        let c0 = Arc::new(FakeClient::new("s0", true, 0));
        let c1 = Arc::new(FakeClient::new("s1", true, 0));
        for i in 0..5 {
            c0.docs.lock().unwrap().insert(format!("k{i:02}"), doc(&format!("k{i:02}")));
        }
        for i in 5..10 {
            c1.docs.lock().unwrap().insert(format!("k{i:02}"), doc(&format!("k{i:02}")));
        }
        clients.insert("s0".to_string(), c0.clone() as Arc<dyn ShardClient>);
        clients.insert("s1".to_string(), c1.clone() as Arc<dyn ShardClient>);

        let mut sets = std::collections::BTreeMap::new();
        let mut p0 = Replica::new(0, 0, "s0", true, true);
        p0.health_status = HealthStatus::Healthy;
        p0.sync_state = SyncState::InSync;
        let mut p1 = Replica::new(1, 0, "s1", true, true);
        p1.health_status = HealthStatus::Healthy;
        p1.sync_state = SyncState::InSync;
        sets.insert(0, Arc::new(ReplicaSet::new(0, Some(p0), vec![])));
        sets.insert(1, Arc::new(ReplicaSet::new(1, Some(p1), vec![])));
        let coordinator = Arc::new(ReplicationCoordinator::new(sets, clients, Arc::new(peacedb_replication::EventBus::default()), ReplicationTuning::default()));
        let service = ReplicatedDocumentService::new(ShardRouter::new(2, HashAlgorithm::Xxh3), coordinator, 1);

        let page = service.all_docs("app", 3, 4, false).await.unwrap();
        let ids: Vec<String> = page.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["k03", "k04", "k05", "k06"]);
    }
}
