//! Sharding and replication configuration, loadable from TOML: typed
//! structs with `#[serde(default)]` fields, parsed once at startup.

use peacedb_sharding::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How this process participates in the sharded topology (spec.md
/// §6.4 `Mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShardMode {
    /// All shards and replicas are simulated in-process, each against
    /// its own data directory. Used for tests and single-box
    /// deployments.
    Local,
    /// Shards/replicas are separate processes reached over the §6.2
    /// wire protocol.
    Distributed,
}

impl Default for ShardMode {
    fn default() -> Self {
        ShardMode::Local
    }
}

/// One shard's listed location in a flat deployment (spec.md §6.4
/// `Shards`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSpec {
    /// Shard identifier, `0..shardCount`.
    pub id: u32,
    /// `local://...` for an in-process shard, `host:port` otherwise.
    pub base_url: String,
    /// Whether this shard's primary node is this process.
    #[serde(default)]
    pub is_local: bool,
}

/// One shard's explicit primary + replica topology (spec.md §6.4
/// `ReplicaSets`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetSpec {
    /// Shard this topology entry describes.
    pub shard_id: u32,
    /// Initial primary's address.
    pub primary: String,
    /// Initial replicas' addresses.
    #[serde(default)]
    pub replicas: Vec<String>,
}

/// Sharding configuration (spec.md §6.4 "Sharding").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardingConfig {
    /// Whether documents are routed by shard at all.
    #[serde(default)]
    pub enabled: bool,
    /// `Local` or `Distributed`.
    #[serde(default)]
    pub mode: ShardMode,
    /// Number of shards, ≥1.
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    /// Hash family; must be uniform across every process in a
    /// deployment.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Flat shard listing, used when `replica_sets` is empty.
    #[serde(default)]
    pub shards: Vec<ShardSpec>,
    /// Explicit per-shard replica topology.
    #[serde(default)]
    pub replica_sets: Vec<ReplicaSetSpec>,
    /// Per-request timeout for remote shard calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// If set, this process *is* one shard and must not act as a
    /// router over the others.
    #[serde(default)]
    pub current_shard_id: Option<u32>,
}

fn default_shard_count() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ShardMode::Local,
            shard_count: default_shard_count(),
            hash_algorithm: HashAlgorithm::default(),
            shards: Vec::new(),
            replica_sets: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            current_shard_id: None,
        }
    }
}

impl ShardingConfig {
    /// Parse from a TOML file.
    pub fn from_file(path: &Path) -> peacedb_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| peacedb_core::Error::Validation(format!("parsing {}: {e}", path.display())))
    }

    /// Serialize to TOML and write to `path`.
    pub fn write_to_file(&self, path: &Path) -> peacedb_core::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| peacedb_core::Error::Validation(format!("serializing sharding config: {e}")))?;
        std::fs::write(path, content).map_err(peacedb_core::Error::from)
    }
}

/// Replication configuration (spec.md §6.4 "Replication").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationConfig {
    /// Whether quorum writes/health monitoring/failover are active at
    /// all.
    #[serde(default)]
    pub enabled: bool,
    /// Replicas per shard, not counting the primary.
    #[serde(default = "default_replica_count")]
    pub replica_count: u32,
    /// Minimum accepting replicas for a write to succeed, `1..=replicaCount+1`.
    #[serde(default = "default_write_quorum")]
    pub write_quorum: usize,
    /// Minimum reachable replicas considered for a read, `1..=replicaCount+1`.
    #[serde(default = "default_read_quorum")]
    pub read_quorum: usize,
    /// Whether reads may be served by in-sync replicas as well as the
    /// primary.
    #[serde(default)]
    pub read_load_balancing: bool,
    /// Per-candidate timeout during a leader election, in milliseconds.
    #[serde(default = "default_failover_timeout_ms")]
    pub failover_timeout_ms: u64,
    /// Health Monitor poll interval, in milliseconds.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Consecutive failed health checks before a replica is marked
    /// unhealthy.
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
    /// Advisory lag (ms) beyond which a replica is reported as lagging
    /// in `getReplicationState`.
    #[serde(default = "default_max_replication_lag_ms")]
    pub max_replication_lag_ms: u64,
}

fn default_replica_count() -> u32 {
    2
}

fn default_write_quorum() -> usize {
    2
}

fn default_read_quorum() -> usize {
    1
}

fn default_failover_timeout_ms() -> u64 {
    5000
}

fn default_health_check_interval_ms() -> u64 {
    5000
}

fn default_unhealthy_threshold() -> u32 {
    3
}

fn default_max_replication_lag_ms() -> u64 {
    1000
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            replica_count: default_replica_count(),
            write_quorum: default_write_quorum(),
            read_quorum: default_read_quorum(),
            read_load_balancing: false,
            failover_timeout_ms: default_failover_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            unhealthy_threshold: default_unhealthy_threshold(),
            max_replication_lag_ms: default_max_replication_lag_ms(),
        }
    }
}

impl ReplicationConfig {
    /// Parse from a TOML file.
    pub fn from_file(path: &Path) -> peacedb_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| peacedb_core::Error::Validation(format!("parsing {}: {e}", path.display())))
    }

    /// Serialize to TOML and write to `path`.
    pub fn write_to_file(&self, path: &Path) -> peacedb_core::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| peacedb_core::Error::Validation(format!("serializing replication config: {e}")))?;
        std::fs::write(path, content).map_err(peacedb_core::Error::from)
    }
}
