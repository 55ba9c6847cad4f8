//! Builds the node/replica-set topology a [`crate::document_service::ReplicatedDocumentService`]
//! runs against, from [`crate::config::ShardingConfig`] /
//! [`crate::config::ReplicationConfig`]. This is the "Initialize()"
//! responsibility spec.md §4.12 assigns to the coordinator, pulled up
//! one layer because building `Local` clients needs the storage crate
//! (which `peacedb-replication` deliberately does not depend on).

use crate::config::{ReplicationConfig, ShardMode, ShardingConfig};
use dashmap::DashMap;
use peacedb_core::Result;
use peacedb_replication::{
    EventBus, HealthMonitorConfig, HealthStatus, Replica, ReplicaSet, ReplicationCoordinator, ReplicationTuning, SyncState,
};
use peacedb_sharding::{HashAlgorithm, LocalShardClient, RemoteShardClient, ShardClient, ShardRouter};
use peacedb_storage::{FileStorageEngine, StorageConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything the Document Service needs to route and replicate: the
/// router, the built coordinator, and the event bus the Health Monitor
/// publishes onto. Local-mode storage engines are kept alive here so
/// their directories stay open for the life of the service.
pub struct Topology {
    /// Hashes document ids to shard ids.
    pub router: ShardRouter,
    /// Owns every shard's replica set and drives failover.
    pub coordinator: Arc<ReplicationCoordinator>,
    /// Replication event bus; the Health Monitor publishes here.
    pub events: Arc<EventBus>,
    /// Health Monitor tuning derived from `ReplicationConfig`.
    pub health_monitor_config: HealthMonitorConfig,
    local_engines: Vec<Arc<FileStorageEngine>>,
}

fn replication_tuning(replication: &ReplicationConfig) -> ReplicationTuning {
    ReplicationTuning {
        read_load_balancing: replication.read_load_balancing,
        failover_timeout: Duration::from_millis(replication.failover_timeout_ms),
        unhealthy_threshold: replication.unhealthy_threshold,
    }
}

fn health_monitor_config(replication: &ReplicationConfig) -> HealthMonitorConfig {
    HealthMonitorConfig {
        interval: Duration::from_millis(replication.health_check_interval_ms),
        check_timeout: Duration::from_millis(replication.failover_timeout_ms),
        unhealthy_threshold: replication.unhealthy_threshold,
    }
}

fn available_replica(shard_id: u32, replica_index: u32, address: impl Into<String>, is_primary: bool, is_local: bool) -> Replica {
    let mut replica = Replica::new(shard_id, replica_index, address, is_primary, is_local);
    replica.health_status = HealthStatus::Healthy;
    replica.sync_state = SyncState::InSync;
    replica
}

impl Topology {
    /// Build every shard's replica set entirely in-process: each
    /// (shard, replica) node gets its own [`FileStorageEngine`] rooted
    /// under a `shard-<id>/{primary,replica-<n>}` subdirectory of
    /// `data_root`. Used for tests and single-box deployments
    /// (`ShardingConfig::mode == Local`).
    pub fn build_local(data_root: &Path, sharding: &ShardingConfig, replication: &ReplicationConfig) -> Result<Self> {
        let shard_count = sharding.shard_count.max(1);
        let replica_count = if replication.enabled { replication.replica_count } else { 0 };

        let clients: DashMap<String, Arc<dyn ShardClient>> = DashMap::new();
        let mut replica_sets = BTreeMap::new();
        let mut local_engines = Vec::new();

        for shard_id in 0..shard_count {
            let primary_addr = format!("local://shard{shard_id}/primary");
            let primary_engine = Arc::new(FileStorageEngine::open(StorageConfig::new(
                data_root.join(format!("shard-{shard_id}")).join("primary"),
            ))?);
            local_engines.push(primary_engine.clone());
            clients.insert(
                primary_addr.clone(),
                Arc::new(LocalShardClient::new(primary_addr.clone(), primary_engine)) as Arc<dyn ShardClient>,
            );
            let primary = available_replica(shard_id, 0, primary_addr, true, true);

            let mut replicas = Vec::new();
            for idx in 0..replica_count {
                let addr = format!("local://shard{shard_id}/replica{idx}");
                let engine = Arc::new(FileStorageEngine::open(StorageConfig::new(
                    data_root.join(format!("shard-{shard_id}")).join(format!("replica-{idx}")),
                ))?);
                local_engines.push(engine.clone());
                clients.insert(addr.clone(), Arc::new(LocalShardClient::new(addr.clone(), engine)) as Arc<dyn ShardClient>);
                replicas.push(available_replica(shard_id, idx + 1, addr, false, true));
            }

            replica_sets.insert(shard_id, Arc::new(ReplicaSet::new(shard_id, Some(primary), replicas)));
        }

        let events = Arc::new(EventBus::default());
        let coordinator = Arc::new(ReplicationCoordinator::new(replica_sets, clients, events.clone(), replication_tuning(replication)));

        Ok(Self {
            router: ShardRouter::new(shard_count, sharding.hash_algorithm),
            coordinator,
            events,
            health_monitor_config: health_monitor_config(replication),
            local_engines,
        })
    }

    /// Build a topology that dials every node over the §6.2 wire
    /// protocol, from `ShardingConfig::replica_sets` (explicit
    /// topology) — used when `ShardingConfig::mode == Distributed`.
    pub fn build_distributed(sharding: &ShardingConfig, replication: &ReplicationConfig) -> Result<Self> {
        let shard_count = sharding.shard_count.max(1);
        let clients: DashMap<String, Arc<dyn ShardClient>> = DashMap::new();
        let mut replica_sets = BTreeMap::new();

        let mut by_shard: BTreeMap<u32, &crate::config::ReplicaSetSpec> = BTreeMap::new();
        for spec in &sharding.replica_sets {
            by_shard.insert(spec.shard_id, spec);
        }

        for shard_id in 0..shard_count {
            let Some(spec) = by_shard.get(&shard_id) else {
                replica_sets.insert(shard_id, Arc::new(ReplicaSet::new(shard_id, None, vec![])));
                continue;
            };

            register_remote_client(&clients, &spec.primary);
            let primary = available_replica(shard_id, 0, spec.primary.clone(), true, false);

            let mut replicas = Vec::new();
            for (idx, addr) in spec.replicas.iter().enumerate() {
                register_remote_client(&clients, addr);
                replicas.push(available_replica(shard_id, idx as u32 + 1, addr.clone(), false, false));
            }

            replica_sets.insert(shard_id, Arc::new(ReplicaSet::new(shard_id, Some(primary), replicas)));
        }

        let events = Arc::new(EventBus::default());
        let coordinator = Arc::new(ReplicationCoordinator::new(replica_sets, clients, events.clone(), replication_tuning(replication)));

        Ok(Self {
            router: ShardRouter::new(shard_count, sharding.hash_algorithm),
            coordinator,
            events,
            health_monitor_config: health_monitor_config(replication),
            local_engines: Vec::new(),
        })
    }

    /// The local `FileStorageEngine`s this topology owns, kept alive
    /// for the service's lifetime (only non-empty in local mode).
    pub fn local_engines(&self) -> &[Arc<FileStorageEngine>] {
        &self.local_engines
    }
}

fn register_remote_client(clients: &DashMap<String, Arc<dyn ShardClient>>, address: &str) {
    if clients.contains_key(address) {
        return;
    }
    clients.insert(address.to_string(), Arc::new(RemoteShardClient::new(address, address)) as Arc<dyn ShardClient>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_topology_has_one_primary_per_shard() {
        let dir = tempfile::tempdir().unwrap();
        let sharding = ShardingConfig { shard_count: 3, mode: ShardMode::Local, enabled: true, ..ShardingConfig::default() };
        let replication = ReplicationConfig { enabled: true, replica_count: 2, ..ReplicationConfig::default() };
        let topology = Topology::build_local(dir.path(), &sharding, &replication).unwrap();

        assert_eq!(topology.router.shard_count(), 3);
        for shard_id in 0..3 {
            let rs = topology.coordinator.get_replica_set(shard_id).unwrap();
            assert!(rs.primary_address().is_some());
            assert_eq!(rs.replicas_snapshot().len(), 2);
        }
        assert_eq!(topology.local_engines().len(), 9);
    }

    #[test]
    fn local_topology_without_replication_has_no_replicas() {
        let dir = tempfile::tempdir().unwrap();
        let sharding = ShardingConfig { shard_count: 1, ..ShardingConfig::default() };
        let replication = ReplicationConfig { enabled: false, ..ReplicationConfig::default() };
        let topology = Topology::build_local(dir.path(), &sharding, &replication).unwrap();

        let rs = topology.coordinator.get_replica_set(0).unwrap();
        assert!(rs.replicas_snapshot().is_empty());
    }
}
