//! The Shard Router (spec.md §4.7): `shardId(key) -> integer in [0, N)`.

use crate::hash::HashAlgorithm;
use std::collections::BTreeMap;

/// Maps document ids to shard ids using a stable hash family.
#[derive(Debug, Clone)]
pub struct ShardRouter {
    shard_count: u32,
    algorithm: HashAlgorithm,
}

impl ShardRouter {
    /// A router over `shard_count` shards (must be at least 1) using
    /// `algorithm`.
    pub fn new(shard_count: u32, algorithm: HashAlgorithm) -> Self {
        assert!(shard_count >= 1, "shard_count must be at least 1");
        Self { shard_count, algorithm }
    }

    /// Number of shards this router distributes across.
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Which shard owns `key`. An empty key always maps to shard 0
    /// (spec.md §4.7: "empty key maps to 0").
    pub fn shard_id(&self, key: &str) -> u32 {
        if key.is_empty() {
            return 0;
        }
        (self.algorithm.hash(key.as_bytes()) % self.shard_count as u64) as u32
    }

    /// Partition `keys` by the shard that owns each (spec.md §4.7
    /// `groupByShards`, used by bulk paths).
    pub fn group_by_shards<'a>(&self, keys: &'a [String]) -> BTreeMap<u32, Vec<&'a str>> {
        let mut groups: BTreeMap<u32, Vec<&'a str>> = BTreeMap::new();
        for key in keys {
            groups.entry(self.shard_id(key)).or_default().push(key.as_str());
        }
        groups
    }
}
