//! Push-State Cache (PSC): per-remote set of commit hashes
//! believed fully pushed, stored as a plain sorted text file.
//!
//! Grounded on `casg::processing_state::ProcessingStateManager`'s
//! read-modify-rewrite pattern (no locking, whole-file truncate+write),
//! adapted from JSON state to a deliberately trivial one-hash-per-line
//! format.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::history::VcsBackend;

/// `git-lob/state/remotes/<remote>/push_state` under the repo's VCS
/// metadata area.
pub struct PushStateCache {
    state_root: PathBuf,
}

impl PushStateCache {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self { state_root: state_root.into() }
    }

    fn path_for(&self, remote: &str) -> PathBuf {
        self.state_root.join("remotes").join(remote).join("push_state")
    }

    fn read_raw(&self, remote: &str) -> Result<BTreeSet<String>> {
        let path = self.path_for(remote);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_raw(&self, remote: &str, commits: &BTreeSet<String>) -> Result<()> {
        let path = self.path_for(remote);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for c in commits {
            text.push_str(c);
            text.push('\n');
        }
        fs::write(&path, text)?;
        Ok(())
    }

    fn known_remotes(&self) -> Result<Vec<String>> {
        let remotes_dir = self.state_root.join("remotes");
        match fs::read_dir(&remotes_dir) {
            Ok(entries) => Ok(entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// `MarkBinariesAsPushed(remote, commit, replaceCommit="")` (spec
    /// §4.3). If `replace_commit` is present in the set, it is overwritten
    /// in place before re-sorting (achieved here by simple remove+insert
    /// into the sorted `BTreeSet`).
    pub fn mark_pushed(&self, remote: &str, commit: &str, replace_commit: Option<&str>) -> Result<()> {
        let mut commits = self.read_raw(remote)?;
        if let Some(replace) = replace_commit {
            commits.remove(replace);
        }
        commits.insert(commit.to_string());
        self.write_raw(remote, &commits)
    }

    /// `GetPushedCommits(remote)` ; `"*"` unions across every
    /// known remote.
    pub fn get_pushed_commits(&self, remote: &str) -> Result<Vec<String>> {
        if remote == "*" {
            let mut all = BTreeSet::new();
            for r in self.known_remotes()? {
                all.extend(self.read_raw(&r)?);
            }
            return Ok(all.into_iter().collect());
        }
        Ok(self.read_raw(remote)?.into_iter().collect())
    }

    /// `CleanupPushState(remote)`: discards any hash that is an
    /// ancestor of another in the list, discards any hash that no longer
    /// resolves to a commit, de-duplicates. O(N²) by construction — the
    /// spec calls this out explicitly and the sets involved (a remote's
    /// frontier of pushed commits) stay small.
    pub fn cleanup(&self, vcs: &dyn VcsBackend, remote: &str) -> Result<()> {
        let commits = self.read_raw(remote)?;
        let mut valid: Vec<String> = Vec::new();
        for c in &commits {
            if vcs.commit_exists(c).unwrap_or(false) {
                valid.push(c.clone());
            }
        }

        let mut frontier: Vec<String> = Vec::new();
        for (i, candidate) in valid.iter().enumerate() {
            let is_ancestor_of_another = valid.iter().enumerate().any(|(j, other)| {
                i != j && vcs.is_ancestor(candidate, other).unwrap_or(false)
            });
            if !is_ancestor_of_another {
                frontier.push(candidate.clone());
            }
        }

        let deduped: BTreeSet<String> = frontier.into_iter().collect();
        self.write_raw(remote, &deduped)
    }

    /// `ResetPushedBinaryState(remote)`.
    pub fn reset(&self, remote: &str) -> Result<()> {
        let path = self.path_for(remote);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `FindLatestAncestorWherePushed(remote, ref)`: best
    /// common ancestor of `ref` with any hash in the pushed list, or
    /// `None`.
    pub fn find_latest_ancestor_where_pushed(
        &self,
        vcs: &dyn VcsBackend,
        remote: &str,
        git_ref: &str,
    ) -> Result<Option<String>> {
        let pushed = self.read_raw(remote)?;
        let mut best: Option<String> = None;
        for candidate in &pushed {
            if let Some(base) = vcs.merge_base(&[git_ref.to_string(), candidate.clone()])? {
                if vcs.is_ancestor(&base, git_ref).unwrap_or(false) {
                    best = Some(match best {
                        Some(current) if vcs.is_ancestor(&current, &base).unwrap_or(false) => base,
                        Some(current) => current,
                        None => base,
                    });
                }
            }
        }
        Ok(best)
    }

    /// `InitSuccessfullyPushedCacheIfAppropriate`: after clone,
    /// if the local store is empty there can be no local-only LOBs, so
    /// every current ref's tip across every remote may be marked pushed,
    /// short-circuiting first-fetch's PSC-advance logic.
    pub fn init_if_local_store_empty(
        &self,
        vcs: &dyn VcsBackend,
        remotes: &[String],
        local_store_is_empty: bool,
    ) -> Result<()> {
        if !local_store_is_empty {
            return Ok(());
        }
        let mut refs = vcs.show_ref()?;
        refs.extend(vcs.for_each_ref("refs/tags")?);
        for remote in remotes {
            for r in &refs {
                self.mark_pushed(remote, &r.commit, None)?;
            }
        }
        Ok(())
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }
}
