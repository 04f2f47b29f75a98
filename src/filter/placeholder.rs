//! Placeholder wire format: exactly `git-lob: ` followed
//! by a 40-hex-character hash, no trailing newline, length exactly
//! `PREFIX.len() + 40` bytes.

use crate::hash::Sha1Hash;

pub const PREFIX: &str = "git-lob: ";
pub const PLACEHOLDER_LEN: usize = PREFIX.len() + Sha1Hash::HEX_LEN;

/// Parses `bytes` as a placeholder iff it is exactly `PLACEHOLDER_LEN` bytes
/// long, starts with `PREFIX`, and the remainder is a valid hex hash.
pub fn parse(bytes: &[u8]) -> Option<Sha1Hash> {
    if bytes.len() != PLACEHOLDER_LEN {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?;
    let hex = text.strip_prefix(PREFIX)?;
    Sha1Hash::from_hex(hex).ok()
}

/// True iff `bytes` is exactly a placeholder's length and content — used by
/// History Walker's snapshot-at-commit to pre-filter blobs by size before
/// reading content.
pub fn looks_like_placeholder_size(size: u64) -> bool {
    size == PLACEHOLDER_LEN as u64
}

pub fn format(sha: &Sha1Hash) -> String {
    format!("{PREFIX}{sha}")
}
