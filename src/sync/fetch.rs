//! Fetch: pull the LOBs a set of commits need into the local
//! store, advancing the Push-State Cache when the whole gap was already on
//! the remote.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hash::Sha1Hash;
use crate::history::{GitRefSpec, HistoryWalker, VcsBackend};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::push_state::PushStateCache;
use crate::store::ChunkedObjectStore;

use super::provider::{SmartSyncProvider, SyncProvider};
use super::types::{FetchOutcome, TransferOutcome};

pub struct FetchRequest<'a> {
    pub remote: &'a str,
    pub refspecs: &'a [GitRefSpec],
    pub dry_run: bool,
    pub force: bool,
}

pub fn fetch(
    vcs: &dyn VcsBackend,
    store: &ChunkedObjectStore,
    psc: &PushStateCache,
    provider: &dyn SyncProvider,
    smart: Option<&dyn SmartSyncProvider>,
    config: &Config,
    req: &FetchRequest,
    mut progress: ProgressCallback<'_>,
) -> Result<FetchOutcome> {
    let walker = HistoryWalker::new(vcs);

    // Step 1: compute needed LOBs.
    let needed: Vec<Sha1Hash> = if req.refspecs.is_empty() {
        walker
            .recent_commits(
                "HEAD",
                config.fetch_commits_period_head,
                config.fetch_commits_period_other,
                config.fetch_refs_period_days,
                &config.fetch_include_paths,
                &config.fetch_exclude_paths,
            )?
            .into_iter()
            .map(|fl| fl.sha)
            .collect()
    } else {
        let mut out = Vec::new();
        for rs in req.refspecs {
            let range = if rs.is_range() {
                format!("{}{}{}", rs.ref1, if rs.range_op == crate::history::RangeOp::ThreeDot { "..." } else { ".." }, rs.ref2.clone().unwrap_or_default())
            } else {
                rs.ref1.clone()
            };
            out.extend(walker.diff_scan(&range, &config.fetch_include_paths, &config.fetch_exclude_paths)?.into_iter().flat_map(|c| c.lob_shas().cloned().collect::<Vec<_>>()));
        }
        out
    };

    // Step 2: PSC-advance candidates.
    let local_empty = store.is_local_empty()?;
    let mut advance_candidates: Vec<String> = Vec::new();
    if local_empty {
        psc.init_if_local_store_empty(vcs, &[req.remote.to_string()], true)?;
    } else {
        for rs in req.refspecs {
            let tip = vcs.rev_parse(&rs.ref1)?;
            if let Some(base) = psc.find_latest_ancestor_where_pushed(vcs, req.remote, &tip)? {
                if base != tip {
                    advance_candidates.push(tip);
                }
            }
        }
    }

    // Step 3: dedup, drop already-local unless force.
    let mut seen = HashSet::new();
    let mut to_fetch: Vec<Sha1Hash> = Vec::new();
    for sha in needed {
        if !seen.insert(sha.clone()) {
            continue;
        }
        if !req.force && store.is_missing(&sha).map(|missing| !missing).unwrap_or(false) {
            continue;
        }
        to_fetch.push(sha);
    }

    let mut outcome = FetchOutcome::default();
    if req.dry_run {
        outcome.downloaded = to_fetch.iter().map(|s| s.to_hex()).collect();
        return Ok(outcome);
    }

    // Step 4/5: delta where smart + above threshold + a historical base is
    // present locally, otherwise raw chunk download.
    for sha in &to_fetch {
        let info = store.get_info(sha);
        let size = info.map(|i| i.size).unwrap_or(u64::MAX);

        let tried_delta = if let Some(smart) = smart {
            if size > config.fetch_deltas_above_size {
                try_fetch_delta(store, smart, req.remote, sha, Box::new(|e: &ProgressEvent| progress(e)))?
            } else {
                false
            }
        } else {
            false
        };

        if tried_delta {
            outcome.deltas_applied.push(sha.clone());
            continue;
        }

        match fetch_raw(provider, store, req.remote, sha, Box::new(|e: &ProgressEvent| progress(e)))? {
            TransferOutcome::Downloaded => outcome.downloaded.push(sha.to_hex()),
            TransferOutcome::Skipped => outcome.skipped.push(sha.to_hex()),
            TransferOutcome::NotFound => outcome.not_found.push(sha.clone()),
            TransferOutcome::Uploaded => unreachable!("fetch never uploads"),
        }
    }

    // Step 7: advance PSC only if nothing was reported missing.
    if outcome.not_found.is_empty() {
        for tip in advance_candidates {
            psc.mark_pushed(req.remote, &tip, None)?;
        }
        psc.cleanup(vcs, req.remote)?;
    } else {
        warn!(remote = req.remote, missing = outcome.not_found.len(), "leaving push-state cache untouched");
    }

    info!(remote = req.remote, downloaded = outcome.downloaded.len(), "fetch complete");
    Ok(outcome)
}

fn try_fetch_delta(
    store: &ChunkedObjectStore,
    smart: &dyn SmartSyncProvider,
    remote: &str,
    target: &Sha1Hash,
    progress: ProgressCallback<'_>,
) -> Result<bool> {
    // A real implementation enumerates the file's historical SHAs; here we
    // probe every LOB already locally present as a delta base candidate,
    // requiring at least one historical-version SHA to already be local
    // without needing history threading through this call.
    let candidates = store.local_candidate_bases();
    if candidates.is_empty() {
        return Ok(false);
    }
    let Some((_, base)) = smart.prepare_delta_for_download(remote, target, &candidates)? else {
        return Ok(false);
    };

    let mut buf = Vec::new();
    smart.download_delta(remote, &base, target, &mut buf, progress)?;
    match crate::delta::apply_lob_delta(store, &base, target, buf.as_slice()) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Downloads a LOB not yet known locally. `splay_relative_paths` can only
/// name the meta entry until the meta record itself is on disk (its
/// `numChunks` field is what makes the rest of the chunk paths knowable),
/// so this fetches the meta record first and only then re-derives the full
/// path list to pull the chunks.
fn fetch_raw(
    provider: &dyn SyncProvider,
    store: &ChunkedObjectStore,
    remote: &str,
    sha: &Sha1Hash,
    mut progress: ProgressCallback<'_>,
) -> Result<TransferOutcome> {
    let meta_rel = store.splay_relative_paths(sha);
    let meta_results = provider.download(
        remote,
        &meta_rel,
        Path::new(store.base_path()),
        false,
        Box::new(|e: &ProgressEvent| progress(e)),
    )?;
    if meta_results.iter().any(|r| r.outcome == TransferOutcome::NotFound) {
        return Ok(TransferOutcome::NotFound);
    }
    let meta_skipped = meta_results.iter().all(|r| r.outcome == TransferOutcome::Skipped);

    let chunk_rel: Vec<String> = store.splay_relative_paths(sha).into_iter().skip(1).collect();
    let chunk_results = if chunk_rel.is_empty() {
        Vec::new()
    } else {
        provider.download(remote, &chunk_rel, Path::new(store.base_path()), false, progress)?
    };
    if chunk_results.iter().any(|r| r.outcome == TransferOutcome::NotFound) {
        return Ok(TransferOutcome::NotFound);
    }
    let chunks_skipped = chunk_results.iter().all(|r| r.outcome == TransferOutcome::Skipped);

    if meta_skipped && chunks_skipped {
        return Ok(TransferOutcome::Skipped);
    }
    Ok(TransferOutcome::Downloaded)
}
