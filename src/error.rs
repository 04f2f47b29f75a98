//! Error taxonomy. Per-kind variants so callers can match on
//! failure class instead of string-sniffing, the way fetch/checkout/fsck
//! each react differently to `NotFound` vs `Integrity`.

use thiserror::Error;

use crate::hash::Sha1Hash;

#[derive(Error, Debug)]
pub enum LobError {
    /// A LOB (or specific path) is absent. Non-fatal: fetch may turn this
    /// into a progress event, checkout leaves the placeholder in place.
    #[error("not found: {0}")]
    NotFound(String),

    /// Composite of multiple missing SHAs (e.g. a batch download where more
    /// than one requested LOB was absent from the remote).
    #[error("{0} SHAs not found: {1}")]
    NotFoundForShas(usize, String),

    /// A file exists with the wrong size; recoverable by re-download, may
    /// trigger fsck deletion.
    #[error("wrong size for {sha}: expected {expected}, found {found}")]
    WrongSize {
        sha: Sha1Hash,
        expected: u64,
        found: u64,
    },

    /// A file or meta record parses but is self-inconsistent (wrong hash,
    /// malformed meta). Not auto-repaired; the caller must fsck.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Remote configuration missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Unexpected I/O or VCS failure.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LobError {
    pub fn not_found_shas(shas: &[Sha1Hash]) -> Self {
        let joined = shas
            .iter()
            .map(Sha1Hash::to_hex)
            .collect::<Vec<_>>()
            .join(", ");
        Self::NotFoundForShas(shas.len(), joined)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotFoundForShas(_, _))
    }
}

pub type Result<T> = std::result::Result<T, LobError>;
