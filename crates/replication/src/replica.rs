//! Per-replica state (spec.md §4.9): the fields tracked about one
//! member of a replica set.

use chrono::{DateTime, Utc};

/// Health as last observed by the Health Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Never checked.
    Unknown,
    /// Check in flight / replica just added.
    Initializing,
    /// Last check succeeded.
    Healthy,
    /// Last check failed or failure threshold exceeded.
    Unhealthy,
}

/// Catch-up state relative to the shard's primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Never computed.
    Unknown,
    /// Lag is within tolerance.
    InSync,
    /// Lag exceeds tolerance.
    Lagging,
    /// Actively catching up (reserved for future streaming catch-up; not
    /// produced by the health-reply-driven sync computation in §4.9).
    Syncing,
    /// Too many consecutive failed health checks.
    Offline,
}

/// One member of a [`crate::replica_set::ReplicaSet`] (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct Replica {
    /// Shard this replica serves.
    pub shard_id: u32,
    /// Position within the replica set's `replicas` list at the time it
    /// was last appended; not an identity (replicas can reorder across
    /// promotions).
    pub replica_index: u32,
    /// `local://...` or `http://host:port` style address.
    pub base_url: String,
    /// Whether this replica is currently serving as primary.
    pub is_primary: bool,
    /// Last observed health.
    pub health_status: HealthStatus,
    /// Last computed sync state relative to the primary.
    pub sync_state: SyncState,
    /// Last sequence number this replica reported.
    pub last_seq: u64,
    /// When the last health check reply (or failure) was recorded.
    pub last_health_check: Option<DateTime<Utc>>,
    /// Consecutive failed health checks since the last success.
    pub failed_health_checks: u32,
    /// When this replica was last promoted to primary, if ever.
    pub promoted_at: Option<DateTime<Utc>>,
    /// Coarse replication lag estimate in milliseconds.
    pub replication_lag_ms: u64,
    /// Whether this replica lives in the same process (no network hop).
    pub is_local: bool,
}

impl Replica {
    /// A freshly-registered replica: unknown health, not yet synced.
    pub fn new(shard_id: u32, replica_index: u32, base_url: impl Into<String>, is_primary: bool, is_local: bool) -> Self {
        Self {
            shard_id,
            replica_index,
            base_url: base_url.into(),
            is_primary,
            health_status: HealthStatus::Initializing,
            sync_state: SyncState::Unknown,
            last_seq: 0,
            last_health_check: None,
            failed_health_checks: 0,
            promoted_at: None,
            replication_lag_ms: 0,
            is_local,
        }
    }

    /// Available iff healthy and not offline (spec.md §4.9 "A replica is
    /// *available* iff ...").
    pub fn is_available(&self) -> bool {
        self.health_status == HealthStatus::Healthy && self.sync_state != SyncState::Offline
    }

    /// Electable iff available and in sync (spec.md §4.9 "A replica is
    /// *electable* iff ...").
    pub fn is_electable(&self) -> bool {
        self.is_available() && self.sync_state == SyncState::InSync
    }
}
