//! The Replica Set state machine (spec.md §4.9).

use crate::events::ReplicationEvent;
use crate::replica::{HealthStatus, Replica, SyncState};
use chrono::Utc;
use parking_lot::Mutex;
use peacedb_core::{Error, Result};

/// A sync state is considered in-sync when the primary leads by fewer
/// than this many sequence numbers (spec.md §4.9 "`lag < 100` -> InSync").
const IN_SYNC_LAG_THRESHOLD: u64 = 100;

struct Inner {
    primary: Option<Replica>,
    replicas: Vec<Replica>,
}

/// One shard's primary + replica topology and health/sync bookkeeping.
/// Guarded by an internal mutex (spec.md §5 "Replica set state... guarded
/// by an internal mutex on the replica set").
pub struct ReplicaSet {
    shard_id: u32,
    inner: Mutex<Inner>,
}

impl ReplicaSet {
    /// Build a replica set for `shard_id` from an initial primary (if
    /// any) and replica list.
    pub fn new(shard_id: u32, primary: Option<Replica>, replicas: Vec<Replica>) -> Self {
        Self { shard_id, inner: Mutex::new(Inner { primary, replicas }) }
    }

    /// The shard this replica set serves.
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    /// The current primary's address, if any.
    pub fn primary_address(&self) -> Option<String> {
        self.inner.lock().primary.as_ref().map(|r| r.base_url.clone())
    }

    /// A snapshot of the primary replica's state.
    pub fn primary_snapshot(&self) -> Option<Replica> {
        self.inner.lock().primary.clone()
    }

    /// A snapshot of every non-primary replica's state.
    pub fn replicas_snapshot(&self) -> Vec<Replica> {
        self.inner.lock().replicas.clone()
    }

    /// Write targets: `{primary if available} ∪ available replicas`
    /// (spec.md §4.9).
    pub fn write_targets(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut targets = Vec::new();
        if let Some(primary) = &inner.primary {
            if primary.is_available() {
                targets.push(primary.base_url.clone());
            }
        }
        targets.extend(inner.replicas.iter().filter(|r| r.is_available()).map(|r| r.base_url.clone()));
        targets
    }

    /// Read targets: primary only unless load balancing is on, in which
    /// case primary plus any in-sync replica (spec.md §4.9).
    pub fn read_targets(&self, read_load_balancing: bool) -> Vec<String> {
        let inner = self.inner.lock();
        let mut targets = Vec::new();
        if let Some(primary) = &inner.primary {
            if primary.is_available() {
                targets.push(primary.base_url.clone());
            }
        }
        if read_load_balancing {
            targets.extend(
                inner
                    .replicas
                    .iter()
                    .filter(|r| r.is_available() && r.sync_state == SyncState::InSync)
                    .map(|r| r.base_url.clone()),
            );
        }
        targets
    }

    /// Apply the result of a health check against `base_url` (spec.md
    /// §4.10). Returns a [`ReplicationEvent::ReplicaRecovered`] if this
    /// reply transitions the replica from unhealthy to healthy, and/or a
    /// [`ReplicationEvent::PrimaryDown`] if this reply pushes the
    /// primary's failure count past `unhealthy_threshold`.
    pub fn record_health_reply(
        &self,
        base_url: &str,
        healthy: bool,
        reported_seq: u64,
        unhealthy_threshold: u32,
    ) -> Vec<ReplicationEvent> {
        let mut inner = self.inner.lock();
        let primary_seq = inner.primary.as_ref().map(|p| p.last_seq).unwrap_or(0);
        let mut events = Vec::new();

        let is_primary = inner.primary.as_ref().map(|p| p.base_url == base_url).unwrap_or(false);
        let replica = if is_primary {
            inner.primary.as_mut()
        } else {
            inner.replicas.iter_mut().find(|r| r.base_url == base_url)
        };
        let Some(replica) = replica else { return events };

        replica.last_health_check = Some(Utc::now());

        if healthy {
            let was_unhealthy = replica.health_status == HealthStatus::Unhealthy;
            replica.last_seq = reported_seq;
            replica.failed_health_checks = 0;
            replica.health_status = HealthStatus::Healthy;
            if was_unhealthy {
                events.push(ReplicationEvent::ReplicaRecovered {
                    shard_id: self.shard_id,
                    base_url: base_url.to_string(),
                });
            }
        } else {
            replica.failed_health_checks += 1;
            if replica.failed_health_checks >= unhealthy_threshold {
                replica.health_status = HealthStatus::Unhealthy;
            }
        }

        let lag = primary_seq.saturating_sub(replica.last_seq);
        if !is_primary {
            replica.sync_state = if lag < IN_SYNC_LAG_THRESHOLD { SyncState::InSync } else { SyncState::Lagging };
            replica.replication_lag_ms = lag;
            if replica.failed_health_checks >= unhealthy_threshold {
                replica.sync_state = SyncState::Offline;
            }
        }

        if is_primary && replica.failed_health_checks >= unhealthy_threshold {
            let downed = replica.base_url.clone();
            inner.primary = None;
            events.push(ReplicationEvent::PrimaryDown { shard_id: self.shard_id, downed_primary: downed });
        }

        events
    }

    /// Mark the current primary down directly (used by the coordinator
    /// ahead of a manually-triggered failover). Returns the old
    /// primary's address, if any.
    pub fn mark_primary_down(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.primary.take().map(|p| p.base_url)
    }

    /// Promote `base_url` to primary if it is electable (spec.md §4.9
    /// `promoteToPrimary`). The previous primary, if any, becomes a
    /// replica appended to `replicas`.
    pub fn promote_to_primary(&self, base_url: &str) -> Result<ReplicationEvent> {
        let mut inner = self.inner.lock();
        let position = inner
            .replicas
            .iter()
            .position(|r| r.base_url == base_url && r.is_electable())
            .ok_or_else(|| {
                Error::ElectionFailed {
                    shard_id: self.shard_id,
                    reason: format!("{base_url} is not an electable candidate"),
                }
            })?;

        let mut winner = inner.replicas.remove(position);
        let old_primary = inner.primary.take();
        let old_primary_address = old_primary.as_ref().map(|p| p.base_url.clone());
        if let Some(mut demoted) = old_primary {
            demoted.is_primary = false;
            inner.replicas.push(demoted);
        }

        winner.is_primary = true;
        winner.promoted_at = Some(Utc::now());
        let new_primary_address = winner.base_url.clone();
        inner.primary = Some(winner);

        Ok(ReplicationEvent::PrimaryChanged {
            shard_id: self.shard_id,
            old_primary: old_primary_address,
            new_primary: new_primary_address,
        })
    }

    /// Whether the current primary's seq lags any replica by more than
    /// 1000, which is advisory grounds for re-election (spec.md §4.11
    /// "Re-election policy").
    pub fn re_election_warranted(&self) -> bool {
        let inner = self.inner.lock();
        let Some(primary) = &inner.primary else { return true };
        inner.replicas.iter().any(|r| r.last_seq > primary.last_seq + 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(shard_id: u32, index: u32, url: &str) -> Replica {
        let mut r = Replica::new(shard_id, index, url, false, true);
        r.health_status = HealthStatus::Healthy;
        r.sync_state = SyncState::InSync;
        r
    }

    #[test]
    fn write_targets_include_only_available() {
        let mut primary = replica(0, 0, "p");
        primary.is_primary = true;
        let mut unhealthy_replica = replica(0, 1, "r1");
        unhealthy_replica.health_status = HealthStatus::Unhealthy;
        let healthy_replica = replica(0, 2, "r2");

        let set = ReplicaSet::new(0, Some(primary), vec![unhealthy_replica, healthy_replica]);
        let targets = set.write_targets();
        assert_eq!(targets, vec!["p".to_string(), "r2".to_string()]);
    }

    #[test]
    fn read_targets_primary_only_without_load_balancing() {
        let mut primary = replica(0, 0, "p");
        primary.is_primary = true;
        let set = ReplicaSet::new(0, Some(primary), vec![replica(0, 1, "r1")]);
        assert_eq!(set.read_targets(false), vec!["p".to_string()]);
        let mut balanced = set.read_targets(true);
        balanced.sort();
        assert_eq!(balanced, vec!["p".to_string(), "r1".to_string()]);
    }

    #[test]
    fn primary_down_after_threshold_failures() {
        let mut primary = replica(0, 0, "p");
        primary.is_primary = true;
        let set = ReplicaSet::new(0, Some(primary), vec![]);

        assert!(set.record_health_reply("p", false, 0, 3).is_empty());
        assert!(set.record_health_reply("p", false, 0, 3).is_empty());
        let events = set.record_health_reply("p", false, 0, 3);
        assert_eq!(events, vec![ReplicationEvent::PrimaryDown { shard_id: 0, downed_primary: "p".to_string() }]);
        assert!(set.primary_address().is_none());
    }

    #[test]
    fn recovered_replica_emits_event() {
        let mut unhealthy_replica = replica(0, 0, "r");
        unhealthy_replica.health_status = HealthStatus::Unhealthy;
        let set = ReplicaSet::new(0, None, vec![unhealthy_replica]);
        let events = set.record_health_reply("r", true, 5, 3);
        assert_eq!(events, vec![ReplicationEvent::ReplicaRecovered { shard_id: 0, base_url: "r".to_string() }]);
    }

    #[test]
    fn promotion_swaps_primary_and_replica() {
        let mut primary = replica(0, 0, "p");
        primary.is_primary = true;
        primary.last_seq = 10;
        let candidate = replica(0, 1, "r1");
        let set = ReplicaSet::new(0, Some(primary), vec![candidate]);

        let event = set.promote_to_primary("r1").unwrap();
        assert_eq!(
            event,
            ReplicationEvent::PrimaryChanged {
                shard_id: 0,
                old_primary: Some("p".to_string()),
                new_primary: "r1".to_string(),
            }
        );
        assert_eq!(set.primary_address(), Some("r1".to_string()));
        let replicas = set.replicas_snapshot();
        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0].base_url, "p");
        assert!(!replicas[0].is_primary);
    }

    #[test]
    fn promoting_non_electable_fails() {
        let mut laggy = replica(0, 0, "r");
        laggy.sync_state = SyncState::Lagging;
        let set = ReplicaSet::new(0, None, vec![laggy]);
        assert!(set.promote_to_primary("r").is_err());
    }
}
