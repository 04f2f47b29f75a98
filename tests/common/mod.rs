//! A hand-written `VcsBackend` standing in for a real VCS binary in
//! integration tests. `MockVcsBackend` (mockall-derived) only exists behind
//! `#[cfg(test)]` inside the library itself, so it isn't visible to these
//! external test binaries — this plays the same role, scripted against an
//! explicit linear commit list instead of per-call expectations.

use chrono::{DateTime, Utc};

use lob_core::error::{LobError, Result};
use lob_core::history::{DiffLine, DiffLineKind, RefInfo, TreeEntry, VcsBackend};

pub struct FakeCommit {
    pub hash: String,
    pub date: DateTime<Utc>,
    /// Full working-tree state as of this commit: `(path, content)`.
    pub tree: Vec<(String, Vec<u8>)>,
    /// Lines this commit's diff would show for `git-lob:` content.
    pub diff: Vec<(String, DiffLineKind, String)>,
}

pub struct FakeVcs {
    commits: Vec<FakeCommit>,
    head: String,
}

impl FakeVcs {
    pub fn new(commits: Vec<FakeCommit>) -> Self {
        let head = commits.last().expect("at least one commit").hash.clone();
        Self { commits, head }
    }

    fn index_of(&self, hash: &str) -> Option<usize> {
        self.commits.iter().position(|c| c.hash == hash)
    }

    fn resolve(&self, rev: &str) -> Option<usize> {
        if rev == "HEAD" {
            self.index_of(&self.head)
        } else {
            self.index_of(rev)
        }
    }

    fn not_found(rev: &str) -> LobError {
        LobError::NotFound(format!("no such fake commit: {rev}"))
    }

    /// Returns matching commit indices, nearest-to-tip first, for the three
    /// range shapes the crate's own range-building code produces: a bare
    /// ref, `BASE..TIP`, and `TIP@{RFC3339}..TIP` (the reflog-date form
    /// `recent_commits` builds for its backward scan).
    fn resolve_range(&self, range: &str) -> Result<Vec<usize>> {
        if let Some(at) = range.find("@{") {
            let close = range[at..].find('}').map(|p| p + at).ok_or_else(|| Self::not_found(range))?;
            let date_str = &range[at + 2..close];
            let since = DateTime::parse_from_rfc3339(date_str)
                .map_err(|e| LobError::Internal(e.to_string()))?
                .with_timezone(&Utc);
            let tip = range[close + 1..].trim_start_matches("..");
            let tip_idx = self.resolve(tip).ok_or_else(|| Self::not_found(tip))?;
            Ok((0..=tip_idx).rev().filter(|&i| self.commits[i].date > since).collect())
        } else if let Some(pos) = range.find("..") {
            let base = &range[..pos];
            let tip = range[pos + 2..].trim_start_matches('.');
            let tip_idx = self.resolve(tip).ok_or_else(|| Self::not_found(tip))?;
            let start = match self.resolve(base) {
                Some(i) => i + 1,
                None if base.is_empty() => 0,
                None => return Err(Self::not_found(base)),
            };
            if start > tip_idx {
                return Ok(Vec::new());
            }
            Ok((start..=tip_idx).rev().collect())
        } else {
            let tip_idx = self.resolve(range).ok_or_else(|| Self::not_found(range))?;
            Ok((0..=tip_idx).rev().collect())
        }
    }
}

impl VcsBackend for FakeVcs {
    fn rev_parse(&self, rev: &str) -> Result<String> {
        self.resolve(rev).map(|i| self.commits[i].hash.clone()).ok_or_else(|| Self::not_found(rev))
    }

    fn ls_tree(&self, commit: &str, _paths: &[String]) -> Result<Vec<TreeEntry>> {
        let idx = self.resolve(commit).ok_or_else(|| Self::not_found(commit))?;
        Ok(self.commits[idx]
            .tree
            .iter()
            .map(|(path, content)| TreeEntry {
                path: path.clone(),
                blob: format!("{commit}:{path}"),
                size: content.len() as u64,
            })
            .collect())
    }

    fn cat_file_batch(&self, blobs: &[String]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(blobs.len());
        for blob in blobs {
            let (commit, path) = blob.split_once(':').ok_or_else(|| LobError::Internal(format!("bad blob id {blob}")))?;
            let idx = self.resolve(commit).ok_or_else(|| Self::not_found(commit))?;
            let content = self.commits[idx]
                .tree
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, c)| c.clone())
                .unwrap_or_default();
            out.push(content);
        }
        Ok(out)
    }

    fn log_diff(&self, range: &str, _content_regex: &str, paths: &[String]) -> Result<Vec<DiffLine>> {
        let indices = self.resolve_range(range)?;
        let mut out = Vec::new();
        for i in indices {
            let c = &self.commits[i];
            for (filename, kind, content) in &c.diff {
                if !paths.is_empty() && !paths.contains(filename) {
                    continue;
                }
                out.push(DiffLine { commit: c.hash.clone(), filename: filename.clone(), kind: *kind, content: content.clone() });
            }
        }
        Ok(out)
    }

    fn show_ref(&self) -> Result<Vec<RefInfo>> {
        Ok(Vec::new())
    }

    fn for_each_ref(&self, _pattern: &str) -> Result<Vec<RefInfo>> {
        Ok(Vec::new())
    }

    fn branch_list(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(match (self.index_of(ancestor), self.index_of(descendant)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        })
    }

    fn merge_base(&self, refs: &[String]) -> Result<Option<String>> {
        let indices: Vec<usize> = refs.iter().filter_map(|r| self.index_of(r)).collect();
        Ok(indices.into_iter().min().map(|i| self.commits[i].hash.clone()))
    }

    fn commit_date(&self, commit: &str) -> Result<DateTime<Utc>> {
        self.resolve(commit).map(|i| self.commits[i].date).ok_or_else(|| Self::not_found(commit))
    }

    fn commit_author(&self, _commit: &str) -> Result<String> {
        Ok("tester".to_string())
    }

    fn update_index(&self, _paths: &[String]) -> Result<()> {
        Ok(())
    }

    fn commit_exists(&self, commit: &str) -> Result<bool> {
        Ok(self.index_of(commit).is_some())
    }
}

/// Deterministic filler, distinct per `seed` so chunks don't dedup by
/// accident across different test files.
pub fn filler_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
