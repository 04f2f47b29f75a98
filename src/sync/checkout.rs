//! Checkout: replace missing or still-placeholder working-copy
//! files with their real content, then batch a single index refresh so the
//! VCS's cached stat data stops disagreeing with the filter's "clean" view.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::filter::{parse_placeholder, PLACEHOLDER_LEN};
use crate::history::{HistoryWalker, VcsBackend};
use crate::store::ChunkedObjectStore;

use super::types::{CheckoutAction, CheckoutResult};

pub struct CheckoutRequest<'a> {
    pub paths: &'a [String],
    pub dry_run: bool,
}

/// Strips a leading `repo_root` component from each input path, passing
/// through anything not rooted under it unchanged.
fn to_repo_relative(paths: &[String], repo_root: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            Path::new(p)
                .strip_prefix(repo_root)
                .unwrap_or_else(|_| Path::new(p))
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

pub fn checkout(
    vcs: &dyn VcsBackend,
    store: &ChunkedObjectStore,
    repo_root: &Path,
    req: &CheckoutRequest,
) -> Result<Vec<CheckoutResult>> {
    let walker = HistoryWalker::new(vcs);
    let head = vcs.rev_parse("HEAD")?;

    let relative = to_repo_relative(req.paths, repo_root);
    let (include, exclude): (Vec<String>, Vec<String>) = (relative, Vec::new());

    let snapshot = walker.snapshot_at_commit(&head, &include, &exclude)?;

    let mut results = Vec::with_capacity(snapshot.len());
    let mut rewritten: Vec<String> = Vec::new();

    for file_lob in snapshot {
        let on_disk = repo_root.join(&file_lob.filename);
        let action = classify(&on_disk, &file_lob.sha)?;

        if matches!(action, CheckoutAction::Replaced) && !req.dry_run {
            replace_with_content(store, &on_disk, &file_lob.sha)?;
            rewritten.push(file_lob.filename.clone());
        }

        results.push(CheckoutResult { filename: file_lob.filename, action });
    }

    if !req.dry_run && !rewritten.is_empty() {
        vcs.update_index(&rewritten)?;
    }

    info!(rewritten = rewritten.len(), checked = results.len(), "checkout complete");
    Ok(results)
}

/// A file is a checkout candidate if it's missing, or present and exactly
/// placeholder-shaped with content matching `expected_sha`. Anything else —
/// wrong size, placeholder for a different LOB, real content — is left
/// alone as user-modified.
fn classify(path: &Path, expected_sha: &crate::hash::Sha1Hash) -> Result<CheckoutAction> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(CheckoutAction::Replaced),
    };

    if metadata.len() != PLACEHOLDER_LEN as u64 {
        return Ok(CheckoutAction::LeftUserModified);
    }

    let content = fs::read(path)?;
    match parse_placeholder(&content) {
        Some(sha) if sha == *expected_sha => Ok(CheckoutAction::Replaced),
        _ => Ok(CheckoutAction::LeftUserModified),
    }
}

pub(super) fn replace_with_content(store: &ChunkedObjectStore, path: &Path, sha: &crate::hash::Sha1Hash) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged: PathBuf = path.with_extension("lob-tmp");
    {
        let mut out = fs::File::create(&staged)?;
        match store.retrieve(sha, &mut out, false, None) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                drop(out);
                let _ = fs::remove_file(&staged);
                return Ok(()); // leave the placeholder in place; `missing` reports this
            }
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(&staged);
                return Err(e);
            }
        }
    }
    fs::rename(&staged, path)?;
    Ok(())
}
