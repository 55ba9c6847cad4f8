//! The unified error type for PeaceDatabase (spec.md §7).
//!
//! Every crate in the workspace that can fail returns `peacedb_core::Error`
//! (or a crate-local error that `impl From<...> for Error`), so callers at
//! any layer can match on one enum.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds the core produces, per spec.md §7.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing required field, bad db name, malformed range, etc.
    #[error("validation error: {0}")]
    Validation(String),

    /// Id absent, db absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Revision mismatch, create-with-rev, duplicate id.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Fewer available replicas than WriteQuorum.
    #[error("quorum unavailable: needed {needed}, had {available}")]
    QuorumUnavailable {
        /// The configured write quorum.
        needed: usize,
        /// The number of replicas that were actually reachable.
        available: usize,
    },

    /// Some replicas accepted, quorum not reached.
    #[error("partial write: {successes} succeeded of {attempted}; errors: {errors:?}")]
    PartialWrite {
        /// Number of replicas that accepted the write.
        successes: usize,
        /// Number of replicas the write was attempted against.
        attempted: usize,
        /// Per-replica failure messages.
        errors: Vec<String>,
    },

    /// Network/timeout talking to a replica.
    #[error("transport error: {0}")]
    Transport(String),

    /// No electable candidate during failover.
    #[error("election failed for shard {shard_id}: {reason}")]
    ElectionFailed {
        /// The shard that failed to elect a new primary.
        shard_id: u32,
        /// Why no candidate was electable.
        reason: String,
    },

    /// WAL line or snapshot line failed to parse; never surfaced to
    /// clients, logged and skipped at the recovery call site.
    #[error("recovery corruption: {0}")]
    RecoveryCorruption(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a caller could reasonably retry this operation (e.g. after
    /// a topology change or on a new replica selection).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::QuorumUnavailable { .. } | Error::Transport(_) | Error::PartialWrite { .. }
        )
    }

    /// Whether this is a revision/identity conflict as opposed to any
    /// other kind of failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_unavailable_is_retryable() {
        let e = Error::QuorumUnavailable {
            needed: 2,
            available: 1,
        };
        assert!(e.is_retryable());
        assert!(!e.is_conflict());
    }

    #[test]
    fn conflict_is_not_retryable() {
        let e = Error::Conflict("stale rev".into());
        assert!(e.is_conflict());
        assert!(!e.is_retryable());
    }

    #[test]
    fn not_found_display() {
        let e = Error::NotFound("doc x".into());
        assert!(e.to_string().contains("doc x"));
        assert!(e.is_not_found());
    }
}
