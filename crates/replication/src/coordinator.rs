//! Replication Coordinator (spec.md §4.12): owns every shard's
//! [`ReplicaSet`], routes write/read target selection to the Document
//! Service, and drives failover when a primary goes down.

use crate::election;
use crate::events::{EventBus, ReplicationEvent};
use crate::replica_set::ReplicaSet;
use dashmap::DashMap;
use peacedb_core::{Error, Result};
use peacedb_sharding::ShardClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs the coordinator consults when choosing targets and
/// running elections (spec.md §6.4). Write/read quorum sizes are a
/// Document Service concern (spec.md §4.13), not a coordinator one, so
/// they live in that crate's config instead of here.
#[derive(Debug, Clone)]
pub struct ReplicationTuning {
    /// Whether reads may be served by in-sync replicas, not just the
    /// primary (spec.md §4.9 `readLoadBalancing`).
    pub read_load_balancing: bool,
    /// Per-candidate timeout during an election (spec.md §4.11).
    pub failover_timeout: Duration,
    /// Consecutive failed health checks before a replica is marked
    /// unhealthy (spec.md §4.10).
    pub unhealthy_threshold: u32,
}

impl Default for ReplicationTuning {
    fn default() -> Self {
        Self {
            read_load_balancing: false,
            failover_timeout: Duration::from_secs(5),
            unhealthy_threshold: 3,
        }
    }
}

/// Coordinates every shard's replica set: target selection for the
/// Document Service, and failover orchestration. Shared state is
/// mutex/map-guarded, with a client cache keyed by replica address.
pub struct ReplicationCoordinator {
    replica_sets: BTreeMap<u32, Arc<ReplicaSet>>,
    clients: DashMap<String, Arc<dyn ShardClient>>,
    events: Arc<EventBus>,
    tuning: ReplicationTuning,
    failovers_in_progress: DashMap<u32, ()>,
}

impl ReplicationCoordinator {
    /// Build a coordinator over an already-constructed replica-set
    /// topology and client cache. Building `Local`/`Remote` clients from
    /// raw configuration is the Document Service's bootstrap
    /// responsibility (it already depends on the storage crate for
    /// local mode); the coordinator only orchestrates once those pieces
    /// exist.
    pub fn new(
        replica_sets: BTreeMap<u32, Arc<ReplicaSet>>,
        clients: DashMap<String, Arc<dyn ShardClient>>,
        events: Arc<EventBus>,
        tuning: ReplicationTuning,
    ) -> Self {
        Self { replica_sets, clients, events, tuning, failovers_in_progress: DashMap::new() }
    }

    /// The replica set serving `shard_id`, if any.
    pub fn get_replica_set(&self, shard_id: u32) -> Option<Arc<ReplicaSet>> {
        self.replica_sets.get(&shard_id).cloned()
    }

    /// Every replica set the coordinator owns, in shard-id order.
    pub fn get_all_replica_sets(&self) -> Vec<Arc<ReplicaSet>> {
        self.replica_sets.values().cloned().collect()
    }

    /// The shard ids this coordinator serves, in order.
    pub fn shard_ids(&self) -> Vec<u32> {
        self.replica_sets.keys().copied().collect()
    }

    /// Look up a cached client by its address directly, independent of
    /// any particular shard's current role assignment. Used to build
    /// the Health Monitor's probe set, which must cover every replica
    /// regardless of whether it is currently a primary or replica.
    pub fn client(&self, address: &str) -> Option<Arc<dyn ShardClient>> {
        self.clients.get(address).map(|c| c.clone())
    }

    /// Every `(address, client)` pair this coordinator knows about.
    pub fn all_clients(&self) -> Vec<(String, Arc<dyn ShardClient>)> {
        self.clients.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    /// The current primary's client for `shard_id`, for writes and
    /// strongly-consistent reads.
    pub fn get_primary_client(&self, shard_id: u32) -> Option<Arc<dyn ShardClient>> {
        let rs = self.replica_sets.get(&shard_id)?;
        let address = rs.primary_address()?;
        self.clients.get(&address).map(|c| c.clone())
    }

    /// Clients for every write target of `shard_id` (spec.md §4.9).
    pub fn get_write_clients(&self, shard_id: u32) -> Vec<Arc<dyn ShardClient>> {
        let Some(rs) = self.replica_sets.get(&shard_id) else { return vec![] };
        rs.write_targets().iter().filter_map(|addr| self.clients.get(addr).map(|c| c.clone())).collect()
    }

    /// Clients for every read target of `shard_id`, honoring
    /// `read_load_balancing` (spec.md §4.9).
    pub fn get_read_clients(&self, shard_id: u32) -> Vec<Arc<dyn ShardClient>> {
        let Some(rs) = self.replica_sets.get(&shard_id) else { return vec![] };
        rs.read_targets(self.tuning.read_load_balancing)
            .iter()
            .filter_map(|addr| self.clients.get(addr).map(|c| c.clone()))
            .collect()
    }

    /// Run a failover for `shard_id`: elect a new primary and broadcast
    /// the change to every surviving replica. A second call while one is
    /// already in flight for the same shard returns immediately without
    /// running another election (spec.md §5).
    pub async fn failover(&self, shard_id: u32) -> Result<ReplicationEvent> {
        if self.failovers_in_progress.insert(shard_id, ()).is_some() {
            return Err(Error::Transport(format!("failover already in progress for shard {shard_id}")));
        }
        let result = self.failover_inner(shard_id).await;
        self.failovers_in_progress.remove(&shard_id);
        result
    }

    async fn failover_inner(&self, shard_id: u32) -> Result<ReplicationEvent> {
        let rs = self
            .replica_sets
            .get(&shard_id)
            .ok_or_else(|| Error::ElectionFailed { shard_id, reason: "unknown shard".to_string() })?;

        let old_primary = rs.primary_address();
        rs.mark_primary_down();

        let candidates: Vec<(String, u32, Arc<dyn ShardClient>)> = rs
            .replicas_snapshot()
            .into_iter()
            .filter_map(|r| self.clients.get(&r.base_url).map(|c| (r.base_url.clone(), r.replica_index, c.clone())))
            .collect();

        match election::elect(rs, &candidates, self.tuning.failover_timeout).await {
            Ok(event) => {
                let new_primary = rs.primary_address();
                if let Some(new) = &new_primary {
                    for replica in rs.replicas_snapshot() {
                        if &replica.base_url == new {
                            continue;
                        }
                        if let Some(client) = self.clients.get(&replica.base_url) {
                            let _ = client.set_primary(new).await;
                        }
                    }
                }
                let completed = ReplicationEvent::FailoverCompleted {
                    shard_id,
                    success: true,
                    old_primary,
                    new_primary,
                    error: None,
                };
                self.events.publish(completed);
                self.events.publish(event.clone());
                Ok(event)
            }
            Err(e) => {
                self.events.publish(ReplicationEvent::FailoverCompleted {
                    shard_id,
                    success: false,
                    old_primary,
                    new_primary: None,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    /// React to a [`ReplicationEvent::PrimaryDown`] by running a
    /// failover for the affected shard (spec.md §4.12).
    pub async fn handle_primary_down(&self, shard_id: u32) -> Result<ReplicationEvent> {
        self.failover(shard_id).await
    }

    /// Sweep every shard and failover any whose primary is missing or
    /// unavailable. Used as a periodic backstop alongside
    /// event-triggered failover.
    pub async fn check_and_failover(&self) {
        for shard_id in self.shard_ids() {
            let Some(rs) = self.get_replica_set(shard_id) else { continue };
            let needs_failover = match rs.primary_snapshot() {
                Some(primary) => !primary.is_available(),
                None => true,
            };
            if needs_failover {
                let _ = self.failover(shard_id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::{HealthStatus, Replica, SyncState};
    use async_trait::async_trait;
    use peacedb_core::Document;
    use peacedb_index::NumericRange;
    use std::collections::BTreeMap as Map;

    struct FakeClient {
        healthy: bool,
        seq: u64,
    }

    #[async_trait]
    impl ShardClient for FakeClient {
        async fn health_check(&self) -> bool {
            self.healthy
        }
        async fn create_db(&self, _db: &str) -> peacedb_core::Result<()> {
            Ok(())
        }
        async fn delete_db(&self, _db: &str) -> peacedb_core::Result<()> {
            Ok(())
        }
        async fn get(&self, _db: &str, _id: &str, _rev: Option<&str>) -> peacedb_core::Result<Option<Document>> {
            Ok(None)
        }
        async fn put(&self, _db: &str, doc: Document) -> peacedb_core::Result<Document> {
            Ok(doc)
        }
        async fn post(&self, _db: &str, doc: Document) -> peacedb_core::Result<Document> {
            Ok(doc)
        }
        async fn delete(&self, _db: &str, _id: &str, _rev: &str) -> peacedb_core::Result<Document> {
            Err(peacedb_core::Error::NotFound("x".to_string()))
        }
        async fn all_docs(&self, _db: &str, _skip: usize, _limit: usize, _include_deleted: bool) -> peacedb_core::Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn find_by_fields(
            &self,
            _db: &str,
            _equals: &Map<String, String>,
            _range: Option<&NumericRange>,
            _skip: usize,
            _limit: usize,
        ) -> peacedb_core::Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn find_by_tags(
            &self,
            _db: &str,
            _all_of: &[String],
            _any_of: &[String],
            _none_of: &[String],
            _skip: usize,
            _limit: usize,
        ) -> peacedb_core::Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn full_text_search(&self, _db: &str, _query: &str, _skip: usize, _limit: usize) -> peacedb_core::Result<Vec<Document>> {
            Ok(vec![])
        }
        async fn seq(&self, _db: &str) -> peacedb_core::Result<u64> {
            Ok(self.seq)
        }
        async fn stats(&self, _db: &str) -> peacedb_core::Result<peacedb_sharding::ShardStats> {
            Err(peacedb_core::Error::Transport("not implemented in fake".to_string()))
        }
        async fn promote(&self) -> peacedb_core::Result<()> {
            Ok(())
        }
        async fn set_primary(&self, _primary_url: &str) -> peacedb_core::Result<()> {
            Ok(())
        }
        fn address(&self) -> &str {
            "fake"
        }
    }

    fn electable_replica(shard_id: u32, index: u32, url: &str) -> Replica {
        let mut r = Replica::new(shard_id, index, url, false, true);
        r.health_status = HealthStatus::Healthy;
        r.sync_state = SyncState::InSync;
        r
    }

    fn coordinator_with_one_shard(primary: Option<Replica>, replicas: Vec<Replica>) -> ReplicationCoordinator {
        let mut sets = BTreeMap::new();
        sets.insert(0, Arc::new(ReplicaSet::new(0, primary, replicas)));
        let clients = DashMap::new();
        clients.insert("p".to_string(), Arc::new(FakeClient { healthy: true, seq: 10 }) as Arc<dyn ShardClient>);
        clients.insert("r1".to_string(), Arc::new(FakeClient { healthy: true, seq: 9 }) as Arc<dyn ShardClient>);
        clients.insert("r2".to_string(), Arc::new(FakeClient { healthy: true, seq: 3 }) as Arc<dyn ShardClient>);
        ReplicationCoordinator::new(sets, clients, Arc::new(EventBus::default()), ReplicationTuning::default())
    }

    #[tokio::test]
    async fn failover_elects_best_replica_and_broadcasts() {
        let mut primary = electable_replica(0, 0, "p");
        primary.is_primary = true;
        let coordinator = coordinator_with_one_shard(Some(primary), vec![electable_replica(0, 1, "r1"), electable_replica(0, 2, "r2")]);

        let event = coordinator.failover(0).await.unwrap();
        assert_eq!(
            event,
            ReplicationEvent::PrimaryChanged { shard_id: 0, old_primary: None, new_primary: "r1".to_string() }
        );
        assert_eq!(coordinator.get_replica_set(0).unwrap().primary_address(), Some("r1".to_string()));
    }

    #[tokio::test]
    async fn failover_with_no_electable_replica_fails() {
        let mut laggy = electable_replica(0, 0, "r1");
        laggy.sync_state = SyncState::Lagging;
        let coordinator = coordinator_with_one_shard(None, vec![laggy]);
        assert!(coordinator.failover(0).await.is_err());
    }

    #[tokio::test]
    async fn failover_unknown_shard_errors() {
        let coordinator = coordinator_with_one_shard(None, vec![]);
        assert!(coordinator.failover(7).await.is_err());
    }

    #[tokio::test]
    async fn get_write_clients_excludes_unavailable_replicas() {
        let mut primary = electable_replica(0, 0, "p");
        primary.is_primary = true;
        let mut offline = electable_replica(0, 1, "r1");
        offline.health_status = HealthStatus::Unhealthy;
        let coordinator = coordinator_with_one_shard(Some(primary), vec![offline, electable_replica(0, 2, "r2")]);

        let targets = coordinator.get_write_clients(0);
        assert_eq!(targets.len(), 2);
    }
}
