//! Content hash type shared by every component: the COS keys LOBs by it, the
//! placeholder format embeds it as hex, and the push-state cache stores
//! commit hashes using the same 40-hex-character shape.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

use crate::error::{LobError, Result};

/// A 40-hex-character content hash (SHA-1 of the complete bytes of a LOB, or
/// a VCS commit hash — both share this shape in git-lob's wire format).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sha1Hash([u8; 20]);

impl Sha1Hash {
    pub const HEX_LEN: usize = 40;

    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Incremental hasher for streaming input (COS.Store reads the content
    /// once, chunk by chunk, and must not buffer the whole LOB in memory).
    pub fn hasher() -> Sha1HashBuilder {
        Sha1HashBuilder(Sha1::new())
    }

    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hash from hex, accepting upper or lower case as the
    /// placeholder format requires.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != Self::HEX_LEN {
            return Err(LobError::Integrity(format!(
                "hash has {} characters, expected {}",
                s.len(),
                Self::HEX_LEN
            )));
        }
        let bytes = hex::decode(s.to_ascii_lowercase())
            .map_err(|e| LobError::Integrity(format!("invalid hex hash {s:?}: {e}")))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

pub struct Sha1HashBuilder(Sha1);

impl Sha1HashBuilder {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finish(self) -> Sha1Hash {
        let digest = self.0.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Sha1Hash(bytes)
    }
}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Hash({})", self.to_hex())
    }
}

impl FromStr for Sha1Hash {
    type Err = LobError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}
