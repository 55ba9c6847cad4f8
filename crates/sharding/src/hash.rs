//! Pluggable key-hashing families (spec.md §4.7, §6.4 `HashAlgorithm`).
//!
//! The algorithm must be stable across processes in the same deployment:
//! whichever variant a router is configured with, every router in the
//! deployment must agree, or documents get routed inconsistently.

use xxhash_rust::xxh3::xxh3_64;

/// A hash family usable for shard assignment. All variants must produce
/// the same value for the same key on every process in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HashAlgorithm {
    /// xxHash3, a fast non-cryptographic hash tuned for distribution
    /// (spec.md §4.7 default).
    Xxh3,
    /// CRC32, a simple polynomial hash.
    Crc32,
    /// SHA-256, truncated to the low 64 bits.
    Sha256Truncated,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Xxh3
    }
}

impl HashAlgorithm {
    /// Hash `key` to a 64-bit value under this algorithm.
    pub fn hash(&self, key: &[u8]) -> u64 {
        match self {
            HashAlgorithm::Xxh3 => xxh3_64(key),
            HashAlgorithm::Crc32 => crc32fast::hash(key) as u64,
            HashAlgorithm::Sha256Truncated => {
                use sha2::{Digest, Sha256};
                let digest = Sha256::digest(key);
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&digest[..8]);
                u64::from_be_bytes(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_algorithm_is_deterministic() {
        for algo in [HashAlgorithm::Xxh3, HashAlgorithm::Crc32, HashAlgorithm::Sha256Truncated] {
            assert_eq!(algo.hash(b"same-key"), algo.hash(b"same-key"));
        }
    }

    #[test]
    fn algorithms_generally_disagree() {
        let key = b"doc-42";
        let a = HashAlgorithm::Xxh3.hash(key);
        let b = HashAlgorithm::Crc32.hash(key);
        assert_ne!(a, b);
    }
}
