//! Push: upload a refspec's ancestor-ordered commits,
//! advancing the Push-State Cache only as far as completeness allows.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hash::Sha1Hash;
use crate::history::{GitRefSpec, HistoryWalker, VcsBackend};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::push_state::PushStateCache;
use crate::store::ChunkedObjectStore;

use super::provider::{SmartSyncProvider, SyncProvider};
use super::types::{CommitCompleteness, PushOutcome, PushedCommit};

pub struct PushRequest<'a> {
    pub remote: &'a str,
    pub refspecs: &'a [GitRefSpec],
    pub dry_run: bool,
    pub force: bool,
    pub recheck: bool,
}

pub fn push(
    vcs: &dyn VcsBackend,
    store: &ChunkedObjectStore,
    psc: &PushStateCache,
    provider: &dyn SyncProvider,
    smart: Option<&dyn SmartSyncProvider>,
    config: &Config,
    req: &PushRequest,
    mut progress: ProgressCallback<'_>,
) -> Result<PushOutcome> {
    let walker = HistoryWalker::new(vcs);
    let mut outcome = PushOutcome::default();

    for refspec in req.refspecs {
        let commits = walker.walk_commits_to_push(req.remote, refspec, psc, req.recheck)?;

        if commits.is_empty() && !refspec.is_range() {
            // Nothing-to-push: mark the tip pushed, the cheapest case.
            let tip = vcs.rev_parse(&refspec.ref1)?;
            if !req.dry_run {
                psc.mark_pushed(req.remote, &tip, None)?;
            }
            continue;
        }

        let mut previous_marked: Option<String> = None;
        let mut all_preceding_complete = true;

        for commit_ref in &commits {
            let (missing_locally, present_shas): (Vec<Sha1Hash>, Vec<Sha1Hash>) = {
                let mut missing = Vec::new();
                let mut present = Vec::new();
                for sha in commit_ref.lob_shas() {
                    if store.is_missing(sha).unwrap_or(true) {
                        missing.push(*sha);
                    } else {
                        present.push(*sha);
                    }
                }
                (missing, present)
            };

            let mut remote_covers_missing = true;
            for sha in &missing_locally {
                let meta_rel = store.splay_relative_paths(sha).remove(0);
                if !provider.file_exists(req.remote, &meta_rel)? {
                    remote_covers_missing = false;
                    break;
                }
            }
            let completeness = if remote_covers_missing { CommitCompleteness::Complete } else { CommitCompleteness::Incomplete };

            if req.dry_run {
                outcome.commits.push(PushedCommit { commit: commit_ref.commit.clone(), completeness });
                continue;
            }

            for sha in &present_shas {
                upload_one(store, provider, smart, config, req.remote, sha, req.force, &mut progress, &mut outcome)?;
            }

            if matches!(completeness, CommitCompleteness::Complete) && all_preceding_complete {
                let replace = previous_marked
                    .as_ref()
                    .filter(|prev| vcs.is_ancestor(prev, &commit_ref.commit).unwrap_or(false))
                    .cloned();
                psc.mark_pushed(req.remote, &commit_ref.commit, replace.as_deref())?;
                previous_marked = Some(commit_ref.commit.clone());
            } else {
                all_preceding_complete = false;
                warn!(commit = %commit_ref.commit, "commit left incomplete, push-state not advanced");
            }

            outcome.commits.push(PushedCommit { commit: commit_ref.commit.clone(), completeness });
        }

        if !req.dry_run {
            psc.cleanup(vcs, req.remote)?;
        }
    }

    info!(remote = req.remote, commits = outcome.commits.len(), "push complete");
    Ok(outcome)
}

fn upload_one(
    store: &ChunkedObjectStore,
    provider: &dyn SyncProvider,
    smart: Option<&dyn SmartSyncProvider>,
    config: &Config,
    remote: &str,
    sha: &Sha1Hash,
    force: bool,
    progress: &mut ProgressCallback<'_>,
    outcome: &mut PushOutcome,
) -> Result<()> {
    let info = store.get_info(sha)?;

    if let Some(smart) = smart {
        if info.size > config.push_deltas_above_size {
            let (already_there, _) = smart.lob_exists(remote, sha)?;
            if !already_there {
                let history_candidates = store.local_candidate_bases();
                if let Some(base) = smart.get_first_complete_lob_from_list(remote, &history_candidates)? {
                    let mut delta_bytes = Vec::new();
                    if crate::delta::generate_lob_delta(store, &base, sha, &mut delta_bytes).is_ok() {
                        let size = delta_bytes.len() as u64;
                        if smart
                            .upload_delta(
                                remote,
                                &base,
                                sha,
                                &mut delta_bytes.as_slice(),
                                size,
                                Box::new(|e: &ProgressEvent| progress(e)),
                            )
                            .is_ok()
                        {
                            outcome.deltas_uploaded.push(*sha);
                            return Ok(());
                        }
                        warn!(sha = %sha, "delta upload failed, falling back to raw chunk upload");
                    }
                }
            }
        }
    }

    let rel_paths = store.splay_relative_paths(sha);
    let results = provider.upload(remote, &rel_paths, store.base_path(), force, Box::new(|e: &ProgressEvent| progress(e)))?;
    outcome.uploaded.extend(results.into_iter().map(|r| r.path));
    Ok(())
}
