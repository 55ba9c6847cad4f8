//! Leader Election (spec.md §4.11): given a replica set with a down
//! primary, gather candidate state, filter to healthy replies, and
//! promote the best one.

use crate::events::ReplicationEvent;
use crate::replica_set::ReplicaSet;
use peacedb_core::{Error, Result};
use peacedb_sharding::ShardClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One candidate's state as gathered during an election.
struct Candidate {
    base_url: String,
    replica_index: u32,
    seq: u64,
}

/// Run an election for `replica_set`, given `candidates` (address,
/// replica_index, client) for every non-unhealthy replica, each bounded
/// by `failover_timeout`. On success, promotes the winner in
/// `replica_set` and returns the resulting [`ReplicationEvent`].
pub async fn elect(
    replica_set: &ReplicaSet,
    candidates: &[(String, u32, Arc<dyn ShardClient>)],
    failover_timeout: Duration,
) -> Result<ReplicationEvent> {
    // Step 1: gather, bounded by a timeout per candidate.
    let mut gathered = Vec::new();
    for (base_url, replica_index, client) in candidates {
        let probe = tokio::time::timeout(failover_timeout, gather_one(client.as_ref()));
        match probe.await {
            Ok(Some(seq)) => gathered.push(Candidate { base_url: base_url.clone(), replica_index: *replica_index, seq }),
            Ok(None) => {
                warn!(replica = %base_url, "candidate reported unhealthy during election");
            }
            Err(_) => {
                warn!(replica = %base_url, "candidate timed out during election");
            }
        }
    }

    // Step 3: no eligible candidate.
    if gathered.is_empty() {
        return Err(Error::ElectionFailed {
            shard_id: replica_set.shard_id(),
            reason: "no eligible candidate".to_string(),
        });
    }

    // Step 4: sort by (-seq, replica_index) - highest seq first, ties by
    // smallest index.
    gathered.sort_by(|a, b| b.seq.cmp(&a.seq).then(a.replica_index.cmp(&b.replica_index)));
    let winner = &gathered[0];

    // Step 5: promote.
    let event = replica_set.promote_to_primary(&winner.base_url)?;

    // Step 6: notify the winner; ignore notification errors.
    if let Some((_, _, client)) = candidates.iter().find(|(url, _, _)| url == &winner.base_url) {
        let _ = tokio::time::timeout(failover_timeout, client.promote()).await;
    }

    Ok(event)
}

/// Step 2 of election: treat an unhealthy/failing health check as "not a
/// candidate" rather than an error.
async fn gather_one(client: &dyn ShardClient) -> Option<u64> {
    if !client.health_check().await {
        return None;
    }
    client.seq("").await.ok()
}
