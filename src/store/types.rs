//! LOB metadata types.

use serde::{Deserialize, Serialize};

use crate::hash::Sha1Hash;

/// Fixed chunk size: 32 MiB, compatibility-critical across
/// repositories — never make this configurable.
pub const CHUNK_SIZE: u64 = 32 * 1024 * 1024;

/// Logical large binary, keyed by content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobInfo {
    pub sha: Sha1Hash,
    pub size: u64,
    pub num_chunks: u32,
}

impl LobInfo {
    pub fn new(sha: Sha1Hash, size: u64) -> Self {
        Self {
            sha,
            size,
            num_chunks: num_chunks_for_size(size),
        }
    }

    /// Length in bytes of chunk `index`, honoring the "last chunk may be
    /// shorter" rule.
    pub fn chunk_len(&self, index: u32) -> Option<u64> {
        if index as u32 >= self.num_chunks {
            return None;
        }
        if index as u32 + 1 == self.num_chunks {
            let full = index as u64 * CHUNK_SIZE;
            Some(self.size - full)
        } else {
            Some(CHUNK_SIZE)
        }
    }
}

/// `⌈size/ChunkSize⌉`, except `size == 0 ⇒ 0`.
pub fn num_chunks_for_size(size: u64) -> u32 {
    if size == 0 {
        0
    } else {
        ((size + CHUNK_SIZE - 1) / CHUNK_SIZE) as u32
    }
}

/// Result of a shallow or deep integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Ok,
    NotFound,
    WrongSize,
    IntegrityError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_chunks_matches_spec_examples() {
        assert_eq!(num_chunks_for_size(0), 0);
        assert_eq!(num_chunks_for_size(1), 1);
        assert_eq!(num_chunks_for_size(CHUNK_SIZE), 1);
        assert_eq!(num_chunks_for_size(CHUNK_SIZE + 1), 2);
        // S1 scenario: 100 MiB file -> 3 full chunks + ~4 MiB remainder.
        let hundred_mib = 100 * 1024 * 1024;
        assert_eq!(num_chunks_for_size(hundred_mib), 4);
    }

    #[test]
    fn chunk_len_shrinks_only_the_last_chunk() {
        let info = LobInfo::new(Sha1Hash::zero(), 100 * 1024 * 1024);
        assert_eq!(info.chunk_len(0), Some(CHUNK_SIZE));
        assert_eq!(info.chunk_len(1), Some(CHUNK_SIZE));
        assert_eq!(info.chunk_len(2), Some(CHUNK_SIZE));
        assert_eq!(info.chunk_len(3), Some(100 * 1024 * 1024 - 3 * CHUNK_SIZE));
        assert_eq!(info.chunk_len(4), None);
    }

    #[test]
    fn empty_lob_has_zero_chunks() {
        let info = LobInfo::new(Sha1Hash::zero(), 0);
        assert_eq!(info.num_chunks, 0);
        assert_eq!(info.chunk_len(0), None);
    }
}
