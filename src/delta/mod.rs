//! Binary Delta Engine (DE): compressed-dictionary deltas between two LOBs
//! already complete in a local store.
//!
//! `casg::delta` is a FASTA-specific substitution-range format with no
//! generic byte-diff underneath it, so the compressor here is grounded
//! instead on `qbsdiff` (the same bsdiff-family approach `oll3-ihop`
//! reaches for when it needs a real binary-delta crate rather than a
//! bespoke format), kept behind the same "base fully in memory, target
//! streamed" contract as the FASTA reconstructor.

use std::io::{Read, Write};

use qbsdiff::{Bsdiff, Bspatch};
use tracing::debug;

use crate::error::{LobError, Result};
use crate::hash::Sha1Hash;
use crate::store::ChunkedObjectStore;

/// A proposed delta transfer: `baseSha` must already be
/// complete at both ends before this is useful.
#[derive(Debug, Clone)]
pub struct LobDelta {
    pub base_sha: Sha1Hash,
    pub target_sha: Sha1Hash,
    pub delta_size: u64,
}

/// Reads `baseSha` fully out of `store` as the dictionary, streams
/// `targetSha`'s complete bytes through the compressor to `out`, and
/// returns the size of the produced delta.
pub fn generate_lob_delta(
    store: &ChunkedObjectStore,
    base_sha: &Sha1Hash,
    target_sha: &Sha1Hash,
    mut out: impl Write,
) -> Result<u64> {
    let mut base = Vec::new();
    store.retrieve(base_sha, &mut base, false, None)?;

    let mut target = Vec::new();
    store.retrieve(target_sha, &mut target, false, None)?;

    let mut patch = Vec::new();
    Bsdiff::new(&base, &target)
        .compare(&mut patch)
        .map_err(|e| LobError::Internal(format!("delta generation failed: {e}")))?;

    out.write_all(&patch)?;
    debug!(base = %base_sha, target = %target_sha, size = patch.len(), "generated delta");
    Ok(patch.len() as u64)
}

/// Reads `baseSha` fully as the dictionary, applies the patch read from
/// `input`, verifies the result hashes to `targetSha`, and stores it via
/// the chunked object store on success.
pub fn apply_lob_delta(
    store: &ChunkedObjectStore,
    base_sha: &Sha1Hash,
    target_sha: &Sha1Hash,
    mut input: impl Read,
) -> Result<()> {
    let mut base = Vec::new();
    store.retrieve(base_sha, &mut base, false, None)?;

    let mut patch = Vec::new();
    input.read_to_end(&mut patch)?;

    let mut reconstructed = Vec::new();
    let mut patcher = Bspatch::new(&patch)
        .map_err(|e| LobError::Internal(format!("malformed delta: {e}")))?;
    patcher
        .apply(&base, &mut reconstructed)
        .map_err(|e| LobError::Internal(format!("delta apply failed: {e}")))?;

    let actual = Sha1Hash::compute(&reconstructed);
    if actual != *target_sha {
        return Err(LobError::Integrity(format!(
            "delta from {base_sha} reconstructed {actual}, expected {target_sha}"
        )));
    }

    store.store(&[], reconstructed.as_slice())?;
    Ok(())
}
