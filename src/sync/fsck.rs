//! Fsck: walk the local (or shared) store verifying every LOB,
//! optionally deleting corrupt entries. Never deletes a partially-missing
//! entry — that one is still resumable by a future fetch.

use tracing::{info, warn};

use crate::error::Result;
use crate::hash::Sha1Hash;
use crate::store::{CheckResult, ChunkedObjectStore};

use super::types::FsckOutcome;

pub struct FsckRequest<'a> {
    pub only: Option<&'a [Sha1Hash]>,
    pub deep: bool,
    pub delete_corrupt: bool,
}

pub fn fsck(store: &ChunkedObjectStore, req: &FsckRequest<'_>) -> Result<FsckOutcome> {
    let candidates: Vec<Sha1Hash> = match req.only {
        Some(shas) => shas.to_vec(),
        None => store.all_local_shas(),
    };

    let mut outcome = FsckOutcome::default();
    for sha in candidates {
        outcome.checked += 1;
        match store.check_files(&sha, req.deep)? {
            CheckResult::Ok => {}
            CheckResult::NotFound => {
                // Entirely absent — nothing to verify, nothing to delete.
            }
            CheckResult::WrongSize => {
                warn!(sha = %sha, "partially present LOB, leaving for resume");
            }
            CheckResult::IntegrityError => {
                outcome.corrupt.push(sha);
                if req.delete_corrupt {
                    store.delete(&sha)?;
                    outcome.deleted.push(sha);
                }
            }
        }
    }

    info!(checked = outcome.checked, corrupt = outcome.corrupt.len(), deleted = outcome.deleted.len(), "fsck complete");
    Ok(outcome)
}
