//! Shard routing and the shard client abstraction (spec.md §4.7, §4.8).

#![warn(missing_docs)]

pub mod client;
pub mod hash;
pub mod router;
pub mod server;
pub mod wire;

pub use client::{LocalShardClient, RemoteShardClient, ShardClient, ShardStats};
pub use hash::HashAlgorithm;
pub use router::ShardRouter;
pub use server::{dispatch, serve, serve_connection};
pub use wire::{Command, Output, ReplicationEntry, ReplicationOp, Request, Response, WireError};
