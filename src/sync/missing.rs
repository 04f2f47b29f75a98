//! Missing: classify every still-placeholder working-copy
//! file into why it never got smudged, for chase-up.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::filter::{parse_placeholder, PLACEHOLDER_LEN};
use crate::history::{HistoryWalker, VcsBackend};
use crate::store::{CheckResult, ChunkedObjectStore};

use super::checkout::replace_with_content;
use super::types::{MissingReport, MissingStatus};

pub struct MissingRequest<'a> {
    pub paths: &'a [String],
    pub checkout: bool,
}

pub fn missing(
    vcs: &dyn VcsBackend,
    store: &ChunkedObjectStore,
    repo_root: &Path,
    req: &MissingRequest,
) -> Result<Vec<MissingReport>> {
    let walker = HistoryWalker::new(vcs);
    let head = vcs.rev_parse("HEAD")?;

    let (include, exclude): (Vec<String>, Vec<String>) = (req.paths.to_vec(), Vec::new());
    let candidates = walker.snapshot_at_commit(&head, &include, &exclude)?;

    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let on_disk = repo_root.join(&candidate.filename);
        let Ok(content) = fs::read(&on_disk) else { continue };
        if content.len() != PLACEHOLDER_LEN {
            continue;
        }
        let Some(sha) = parse_placeholder(&content) else { continue };

        let status = classify(vcs, &walker, store, &head, &on_disk, &candidate.filename, &sha, req.checkout)?;
        out.push(MissingReport { filename: candidate.filename, sha, status });
    }

    Ok(out)
}

fn classify(
    vcs: &dyn VcsBackend,
    walker: &HistoryWalker,
    store: &ChunkedObjectStore,
    head: &str,
    on_disk: &Path,
    filename: &str,
    sha: &crate::hash::Sha1Hash,
    do_checkout: bool,
) -> Result<MissingStatus> {
    match store.check_files(sha, true)? {
        CheckResult::Ok => {
            if do_checkout {
                replace_with_content(store, on_disk, sha)?;
                Ok(MissingStatus::MissingFixed)
            } else {
                Ok(MissingStatus::MissingAvailable)
            }
        }
        CheckResult::WrongSize | CheckResult::IntegrityError => Ok(MissingStatus::MissingCorrupt),
        CheckResult::NotFound => match walker.find_introducing_commit(head, filename, sha)? {
            None => Ok(MissingStatus::MissingModified),
            Some(commit) => {
                let date = vcs.commit_date(&commit)?;
                let author = vcs.commit_author(&commit)?;
                Ok(MissingStatus::MissingBlamed { commit, author, date })
            }
        },
    }
}
