//! Replica sets, health monitoring, leader election and the replication
//! coordinator (spec.md §4.9-§4.12).

mod coordinator;
mod election;
mod events;
mod health;
mod replica;
mod replica_set;

pub use coordinator::{ReplicationCoordinator, ReplicationTuning};
pub use election::elect;
pub use events::{EventBus, ReplicationEvent};
pub use health::{HealthMonitor, HealthMonitorConfig};
pub use replica::{HealthStatus, Replica, SyncState};
pub use replica_set::ReplicaSet;
