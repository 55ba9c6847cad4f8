//! The wire protocol's request/response types (spec.md §6.2) and the
//! Replicated Document Service (spec.md §2 component 13, §4.13): the
//! top-level implementation of the document-service contract, composing
//! the Shard Router and Replication Coordinator.

#![warn(missing_docs)]

pub mod config;
pub mod document_service;
pub mod topology;

pub use config::{ReplicaSetSpec, ReplicationConfig, ShardMode, ShardSpec, ShardingConfig};
pub use document_service::ReplicatedDocumentService;
pub use topology::Topology;

/// The §6.2 wire protocol server: accepts connections from peers'
/// `RemoteShardClient`s and dispatches onto a colocated `ShardClient`
/// (almost always a `LocalShardClient` wrapping this node's storage).
/// Re-exported here because a node process wiring up a `Topology` is
/// the natural caller, even though the implementation lives in
/// `peacedb-sharding` alongside the client it answers.
pub use peacedb_sharding::{dispatch, serve, serve_connection};
