//! Replication events and the pub/sub bus they travel over, backed by
//! `tokio::sync::broadcast` for fire-and-forget background-task
//! notifications.

use tokio::sync::broadcast;

/// Something noteworthy happened to a replica set.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    /// A replica set's primary changed, whether via failover or manual
    /// promotion (spec.md §4.9).
    PrimaryChanged {
        /// Affected shard.
        shard_id: u32,
        /// Previous primary's address, if any.
        old_primary: Option<String>,
        /// New primary's address.
        new_primary: String,
    },
    /// A primary was declared down by the Health Monitor (spec.md §4.10).
    PrimaryDown {
        /// Affected shard.
        shard_id: u32,
        /// The primary that was marked down.
        downed_primary: String,
    },
    /// A failover attempt finished, successfully or not (spec.md §4.12).
    FailoverCompleted {
        /// Affected shard.
        shard_id: u32,
        /// Whether a new primary was installed.
        success: bool,
        /// Primary before the failover, if any.
        old_primary: Option<String>,
        /// Primary after the failover, if one was elected.
        new_primary: Option<String>,
        /// Failure detail when `success` is false.
        error: Option<String>,
    },
    /// A previously-unhealthy replica passed a health check again
    /// (spec.md §4.10).
    ReplicaRecovered {
        /// Affected shard.
        shard_id: u32,
        /// The replica that recovered.
        base_url: String,
    },
}

/// A broadcast bus subscribers can listen on for [`ReplicationEvent`]s.
/// Publishing never blocks on subscribers; a lagging or absent receiver
/// just misses events.
pub struct EventBus {
    sender: broadcast::Sender<ReplicationEvent>,
}

impl EventBus {
    /// A bus with room for `capacity` buffered events per lagging
    /// subscriber before they start missing messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of active subscribers that
    /// received it; `Err` only if there are none.
    pub fn publish(&self, event: ReplicationEvent) {
        // A send error just means no one is subscribed right now; that's
        // not a failure the publisher should care about.
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events. Events published before this call are
    /// not delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
