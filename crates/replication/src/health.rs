//! Health Monitor (spec.md §4.10): a background loop that polls every
//! replica in every replica set on an interval and feeds replies into
//! [`ReplicaSet::record_health_reply`], publishing the resulting events
//! on the [`EventBus`].

use crate::events::{EventBus, ReplicationEvent};
use crate::replica_set::ReplicaSet;
use peacedb_sharding::ShardClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Tuning for the Health Monitor loop (spec.md §6.4 replication config:
/// `healthCheckIntervalMs`, `healthCheckTimeoutMs`, `unhealthyThreshold`).
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// How often to poll every replica.
    pub interval: Duration,
    /// Per-replica probe timeout; a replica that doesn't answer in time
    /// counts as unhealthy for that round.
    pub check_timeout: Duration,
    /// Consecutive failed checks before a replica is marked unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            check_timeout: Duration::from_secs(2),
            unhealthy_threshold: 3,
        }
    }
}

/// Polls every replica set's members on a timer and republishes the
/// resulting replication events. Shuts down cooperatively via a `watch`
/// channel rather than polling an atomic flag.
pub struct HealthMonitor {
    replica_sets: Vec<Arc<ReplicaSet>>,
    clients: HashMap<String, Arc<dyn ShardClient>>,
    events: Arc<EventBus>,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    /// Build a monitor over `replica_sets`, dialing out through
    /// `clients` (keyed by replica base URL).
    pub fn new(
        replica_sets: Vec<Arc<ReplicaSet>>,
        clients: HashMap<String, Arc<dyn ShardClient>>,
        events: Arc<EventBus>,
        config: HealthMonitorConfig,
    ) -> Self {
        Self { replica_sets, clients, events, config }
    }

    /// Run until `shutdown` reports `true`, polling once per tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("health monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Probe every known replica once, bounded by `check_timeout`, and
    /// publish whatever events result.
    pub async fn poll_once(&self) {
        let mut targets: Vec<(Arc<ReplicaSet>, String)> = Vec::new();
        for rs in &self.replica_sets {
            if let Some(primary) = rs.primary_snapshot() {
                targets.push((rs.clone(), primary.base_url));
            }
            for replica in rs.replicas_snapshot() {
                targets.push((rs.clone(), replica.base_url));
            }
        }

        let mut probes = JoinSet::new();
        for (rs, base_url) in targets {
            let Some(client) = self.clients.get(&base_url).cloned() else {
                warn!(replica = %base_url, "health monitor has no client for replica");
                continue;
            };
            let timeout = self.config.check_timeout;
            let threshold = self.config.unhealthy_threshold;
            probes.spawn(async move {
                let healthy = tokio::time::timeout(timeout, client.health_check()).await.unwrap_or(false);
                let seq = if healthy {
                    tokio::time::timeout(timeout, client.seq(""))
                        .await
                        .ok()
                        .and_then(|r| r.ok())
                        .unwrap_or(0)
                } else {
                    0
                };
                rs.record_health_reply(&base_url, healthy, seq, threshold)
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(events) => {
                    let events: Vec<ReplicationEvent> = events;
                    for event in events {
                        self.events.publish(event);
                    }
                }
                Err(e) => warn!(error = %e, "health probe task panicked"),
            }
        }
    }
}
