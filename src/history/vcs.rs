//! The narrow shell-out surface onto the external VCS binary. `VcsBackend` is the
//! only way the rest of the crate touches the VCS; every implementation
//! (real process, mock) goes through this trait.
//!
//! `ProcessVcsBackend` always drains a child's stdout fully before waiting
//! on it, so a large diff or blob list can't deadlock against a full pipe.

use std::io::Read;
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};

use crate::error::{LobError, Result};

use super::types::CommitHash;

/// One entry from `ls-tree`: a path and the blob it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: String,
    pub size: u64,
}

/// One ref from `for-each-ref` / `show-ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    pub name: String,
    pub commit: CommitHash,
    pub commit_date: DateTime<Utc>,
}

/// One line of a unified diff's content, tagged with which side it came
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub commit: CommitHash,
    pub filename: String,
    pub kind: DiffLineKind,
    pub content: String,
}

/// Per-OS argument-list limits, used to chunk long path lists before
/// shelling out (e.g. `cat-file --batch` over thousands of blobs).
#[derive(Debug, Clone, Copy)]
pub struct ArgLimits {
    pub max_args: usize,
    pub max_len: usize,
}

impl ArgLimits {
    pub fn for_current_os() -> Self {
        if cfg!(windows) {
            Self { max_args: 2048, max_len: 8_000 }
        } else {
            Self { max_args: 8192, max_len: 120_000 }
        }
    }

    /// Splits `args` into batches respecting both the count and the
    /// approximate total-length limit.
    pub fn chunk<'a>(&self, args: &'a [String]) -> Vec<Vec<&'a str>> {
        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for arg in args {
            let would_be_len = current_len + arg.len() + 1;
            if !current.is_empty() && (current.len() >= self.max_args || would_be_len > self.max_len) {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current_len += arg.len() + 1;
            current.push(arg.as_str());
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait VcsBackend: Send + Sync {
    fn rev_parse(&self, rev: &str) -> Result<CommitHash>;
    fn ls_tree(&self, commit: &str, paths: &[String]) -> Result<Vec<TreeEntry>>;
    /// Batched blob-content oracle, backed by `cat-file --batch`.
    fn cat_file_batch(&self, blobs: &[String]) -> Result<Vec<Vec<u8>>>;
    fn log_diff(&self, range: &str, content_regex: &str, paths: &[String]) -> Result<Vec<DiffLine>>;
    fn show_ref(&self) -> Result<Vec<RefInfo>>;
    fn for_each_ref(&self, pattern: &str) -> Result<Vec<RefInfo>>;
    fn branch_list(&self) -> Result<Vec<String>>;
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;
    fn merge_base(&self, refs: &[String]) -> Result<Option<CommitHash>>;
    fn commit_date(&self, commit: &str) -> Result<DateTime<Utc>>;
    fn commit_author(&self, commit: &str) -> Result<String>;
    fn update_index(&self, paths: &[String]) -> Result<()>;
    fn commit_exists(&self, commit: &str) -> Result<bool>;
}

/// Shells out to the real VCS binary. Every invocation drains stdout fully
/// before waiting on the child, and long path lists are
/// chunked through `ArgLimits`.
pub struct ProcessVcsBackend {
    binary: String,
    repo_dir: std::path::PathBuf,
    limits: ArgLimits,
}

impl ProcessVcsBackend {
    pub fn new(binary: impl Into<String>, repo_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            repo_dir: repo_dir.into(),
            limits: ArgLimits::for_current_os(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.repo_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LobError::Internal(format!("failed to spawn {}: {e}", self.binary)))?;

        let mut stdout = String::new();
        child
            .stdout
            .take()
            .expect("piped stdout")
            .read_to_string(&mut stdout)
            .map_err(|e| LobError::Internal(e.to_string()))?;

        let status = child
            .wait()
            .map_err(|e| LobError::Internal(format!("failed to wait for {}: {e}", self.binary)))?;

        if !status.success() {
            return Err(LobError::Internal(format!(
                "{} {:?} exited with {status}",
                self.binary, args
            )));
        }
        Ok(stdout)
    }
}

impl VcsBackend for ProcessVcsBackend {
    fn rev_parse(&self, rev: &str) -> Result<CommitHash> {
        Ok(self.run(&["rev-parse", rev])?.trim().to_string())
    }

    fn ls_tree(&self, commit: &str, paths: &[String]) -> Result<Vec<TreeEntry>> {
        let mut args = vec!["ls-tree".to_string(), "-r".to_string(), "-l".to_string(), commit.to_string()];
        args.extend(paths.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;
        Ok(out
            .lines()
            .filter_map(parse_ls_tree_line)
            .collect())
    }

    fn cat_file_batch(&self, blobs: &[String]) -> Result<Vec<Vec<u8>>> {
        let mut results = Vec::with_capacity(blobs.len());
        for batch in self.limits.chunk(blobs) {
            for blob in batch {
                results.push(self.run(&["cat-file", "-p", blob])?.into_bytes());
            }
        }
        Ok(results)
    }

    fn log_diff(&self, range: &str, _content_regex: &str, paths: &[String]) -> Result<Vec<DiffLine>> {
        let mut args = vec!["log".to_string(), "-p".to_string(), "--follow".to_string(), range.to_string()];
        args.extend(paths.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;
        Ok(parse_log_diff(&out))
    }

    fn show_ref(&self) -> Result<Vec<RefInfo>> {
        let out = self.run(&["show-ref"])?;
        self.refs_from_names(out.lines().filter_map(|l| l.split_whitespace().nth(1)))
    }

    fn for_each_ref(&self, pattern: &str) -> Result<Vec<RefInfo>> {
        let out = self.run(&["for-each-ref", pattern, "--format=%(refname)"])?;
        self.refs_from_names(out.lines())
    }

    fn branch_list(&self) -> Result<Vec<String>> {
        let out = self.run(&["branch", "--list", "--format=%(refname:short)"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let status = Command::new(&self.binary)
            .args(["merge-base", "--is-ancestor", ancestor, descendant])
            .current_dir(&self.repo_dir)
            .status()
            .map_err(|e| LobError::Internal(e.to_string()))?;
        Ok(status.success())
    }

    fn merge_base(&self, refs: &[String]) -> Result<Option<CommitHash>> {
        let mut args = vec!["merge-base".to_string()];
        args.extend(refs.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        match self.run(&arg_refs) {
            Ok(out) => Ok(Some(out.trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    fn commit_date(&self, commit: &str) -> Result<DateTime<Utc>> {
        let out = self.run(&["show", "-s", "--format=%ct", commit])?;
        let ts: i64 = out
            .trim()
            .parse()
            .map_err(|_| LobError::Internal(format!("unparseable commit date for {commit}")))?;
        DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| LobError::Internal(format!("out-of-range commit date for {commit}")))
    }

    fn commit_author(&self, commit: &str) -> Result<String> {
        Ok(self.run(&["show", "-s", "--format=%an", commit])?.trim().to_string())
    }

    fn update_index(&self, paths: &[String]) -> Result<()> {
        for batch in self.limits.chunk(paths) {
            let mut args = vec!["update-index", "--again"];
            args.extend(batch);
            self.run(&args)?;
        }
        Ok(())
    }

    fn commit_exists(&self, commit: &str) -> Result<bool> {
        Ok(self.rev_parse(commit).is_ok())
    }
}

impl ProcessVcsBackend {
    fn refs_from_names<'a>(&self, names: impl Iterator<Item = &'a str>) -> Result<Vec<RefInfo>> {
        let mut out = Vec::new();
        for name in names {
            let commit = self.rev_parse(name)?;
            let commit_date = self.commit_date(&commit)?;
            out.push(RefInfo { name: name.to_string(), commit, commit_date });
        }
        Ok(out)
    }
}

fn parse_ls_tree_line(line: &str) -> Option<TreeEntry> {
    // "<mode> blob <sha>\t<size>\t<path>" roughly; `-l` adds a size column.
    let (meta, path) = line.split_once('\t')?;
    let mut fields = meta.split_whitespace();
    let _mode = fields.next()?;
    let kind = fields.next()?;
    if kind != "blob" {
        return None;
    }
    let blob = fields.next()?.to_string();
    let size: u64 = fields.next()?.trim().parse().ok()?;
    Some(TreeEntry { path: path.to_string(), blob, size })
}

fn parse_log_diff(out: &str) -> Vec<DiffLine> {
    let mut lines = Vec::new();
    let mut commit = String::new();
    let mut filename = String::new();

    for raw in out.lines() {
        if let Some(rest) = raw.strip_prefix("commit ") {
            commit = rest.trim().to_string();
        } else if let Some(rest) = raw.strip_prefix("+++ b/") {
            filename = rest.trim().to_string();
        } else if let Some(content) = raw.strip_prefix('+') {
            if content.starts_with("++") {
                continue;
            }
            lines.push(DiffLine {
                commit: commit.clone(),
                filename: filename.clone(),
                kind: DiffLineKind::Added,
                content: content.to_string(),
            });
        } else if let Some(content) = raw.strip_prefix('-') {
            if content.starts_with("--") {
                continue;
            }
            lines.push(DiffLine {
                commit: commit.clone(),
                filename: filename.clone(),
                kind: DiffLineKind::Removed,
                content: content.to_string(),
            });
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_limits_chunk_by_count() {
        let limits = ArgLimits { max_args: 2, max_len: 10_000 };
        let args: Vec<String> = (0..5).map(|i| format!("arg{i}")).collect();
        let chunks = limits.chunk(&args);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec!["arg0", "arg1"]);
        assert_eq!(chunks[2], vec!["arg4"]);
    }

    #[test]
    fn arg_limits_chunk_by_length() {
        let limits = ArgLimits { max_args: 100, max_len: 12 };
        let args = vec!["aaaaa".to_string(), "bbbbb".to_string(), "ccccc".to_string()];
        let chunks = limits.chunk(&args);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn parses_ls_tree_line_with_size() {
        let line = "100644 blob abc123\t42\tpath/to/file.bin";
        let entry = parse_ls_tree_line(line).unwrap();
        assert_eq!(entry.path, "path/to/file.bin");
        assert_eq!(entry.blob, "abc123");
        assert_eq!(entry.size, 42);
    }

    #[test]
    fn parses_added_and_removed_diff_lines() {
        let patch = "commit deadbeef\n+++ b/data.bin\n+git-lob: aaaa\n-git-lob: bbbb\n";
        let lines = parse_log_diff(patch);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind, DiffLineKind::Added);
        assert_eq!(lines[0].content, "git-lob: aaaa");
        assert_eq!(lines[1].kind, DiffLineKind::Removed);
    }
}
