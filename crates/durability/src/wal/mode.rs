//! Durability mode configuration (spec.md §4.4).
//!
//! Controls when the WAL file is fsynced. Orthogonal to whether a WAL
//! exists at all — PeaceDatabase always writes the WAL; this only
//! controls how aggressively it is flushed to disk.

/// How eagerly the WAL writer fsyncs after an append.
///
/// | Mode | fsync | Data loss window |
/// |------|-------|-------------------|
/// | `Relaxed` | never explicitly | up to OS page cache flush |
/// | `Commit` | every `batch_size` writes or `interval_ms` | bounded batch |
/// | `Strong` | every append | zero |
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DurabilityMode {
    /// Rely on the OS to flush the page cache eventually. Fastest, weakest.
    Relaxed,
    /// fsync every `batch_size` writes or `interval_ms`, whichever comes
    /// first. The default (spec.md §4.4 default durability mode).
    Commit {
        /// Maximum writes between fsyncs.
        batch_size: usize,
        /// Maximum milliseconds between fsyncs.
        interval_ms: u64,
    },
    /// fsync after every single append. Slowest, strongest.
    Strong,
}

impl DurabilityMode {
    /// Whether this mode ever batches fsyncs rather than deciding per-write.
    pub fn is_batched(&self) -> bool {
        matches!(self, DurabilityMode::Commit { .. })
    }

    /// The commit-mode default: fsync every 1000 writes or 100ms.
    pub fn commit_default() -> Self {
        DurabilityMode::Commit {
            batch_size: 1000,
            interval_ms: 100,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::commit_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_commit_is_batched() {
        assert!(!DurabilityMode::Relaxed.is_batched());
        assert!(DurabilityMode::commit_default().is_batched());
        assert!(!DurabilityMode::Strong.is_batched());
    }
}
