//! Remote transport capability traits and a filesystem-backed
//! implementation used for tests, single-machine shared remotes, and as the
//! reference "dumb" transport any bucket-style store can imitate.
//!
//! Grounded on `casg::cloud::CloudStorage` — a small async surface in
//! front of S3 that callers treat uniformly regardless of backend. The
//! shape here is the same (capability trait + progress callback + one
//! concrete backend) but kept synchronous, since the orchestrator runs
//! the blocking transfer loop on a worker thread rather than an async
//! runtime, and split into a required surface plus an optional smart
//! superset so a remote can opt into delta transfer without every
//! transport having to implement it.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{LobError, Result};
use crate::hash::Sha1Hash;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::store::{meta_path, parse_meta};

use super::types::{Capability, TransferOutcome, TransferResult};

/// Required surface every remote must implement.
pub trait SyncProvider: Send + Sync {
    fn type_id(&self) -> &'static str;

    fn validate_config(&self, remote: &str) -> Result<()>;

    /// Uploads `rel_paths` (relative to the LOB splay layout) from
    /// `from_dir`, skipping any remote file already of matching size
    /// unless `force`. Stops early if `progress` returns `true` (abort).
    fn upload(
        &self,
        remote: &str,
        rel_paths: &[String],
        from_dir: &Path,
        force: bool,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<TransferResult>>;

    fn download(
        &self,
        remote: &str,
        rel_paths: &[String],
        to_dir: &Path,
        force: bool,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<TransferResult>>;

    fn file_exists(&self, remote: &str, rel_path: &str) -> Result<bool>;

    fn file_exists_and_is_of_size(&self, remote: &str, rel_path: &str, size: u64) -> Result<bool>;
}

/// Optional superset a provider implements when it supports
/// delta transfer and LOB-level existence queries.
pub trait SmartSyncProvider: SyncProvider {
    fn query_caps(&self, remote: &str) -> Result<Vec<Capability>>;

    fn lob_exists(&self, remote: &str, sha: &Sha1Hash) -> Result<(bool, u64)>;

    /// Asks the remote to choose a base from `candidate_bases` (locally
    /// present SHAs in the file's history) it can prepare a delta against;
    /// returns the delta's size and the base chosen.
    fn prepare_delta_for_download(
        &self,
        remote: &str,
        sha: &Sha1Hash,
        candidate_bases: &[Sha1Hash],
    ) -> Result<Option<(u64, Sha1Hash)>>;

    fn download_delta(
        &self,
        remote: &str,
        base_sha: &Sha1Hash,
        target_sha: &Sha1Hash,
        out: &mut dyn Write,
        progress: ProgressCallback<'_>,
    ) -> Result<()>;

    fn upload_delta(
        &self,
        remote: &str,
        base_sha: &Sha1Hash,
        target_sha: &Sha1Hash,
        data: &mut dyn Read,
        size: u64,
        progress: ProgressCallback<'_>,
    ) -> Result<()>;

    /// First SHA (in order) the remote has complete.
    fn get_first_complete_lob_from_list(&self, remote: &str, candidates: &[Sha1Hash]) -> Result<Option<Sha1Hash>>;
}

/// A remote addressed as a plain directory tree mirroring the local splay
/// layout. Doubles as the smart provider in tests by also tracking
/// which LOBs it has complete, so delta-transfer code paths are exercisable
/// without a real network-facing backend.
pub struct FilesystemSyncProvider {
    remotes_root: PathBuf,
}

impl FilesystemSyncProvider {
    pub fn new(remotes_root: impl Into<PathBuf>) -> Self {
        Self { remotes_root: remotes_root.into() }
    }

    fn remote_root(&self, remote: &str) -> PathBuf {
        self.remotes_root.join(remote)
    }

    fn remote_path(&self, remote: &str, rel_path: &str) -> PathBuf {
        self.remote_root(remote).join(rel_path)
    }

    fn delta_path(&self, remote: &str, base: &Sha1Hash, target: &Sha1Hash) -> PathBuf {
        self.remote_root(remote).join("deltas").join(format!("{base}..{target}"))
    }
}

impl SyncProvider for FilesystemSyncProvider {
    fn type_id(&self) -> &'static str {
        "filesystem"
    }

    fn validate_config(&self, remote: &str) -> Result<()> {
        let root = self.remote_root(remote);
        fs::create_dir_all(&root).map_err(LobError::from)?;
        Ok(())
    }

    fn upload(
        &self,
        remote: &str,
        rel_paths: &[String],
        from_dir: &Path,
        force: bool,
        mut progress: ProgressCallback<'_>,
    ) -> Result<Vec<TransferResult>> {
        let mut results = Vec::with_capacity(rel_paths.len());
        for rel in rel_paths {
            let src = from_dir.join(rel);
            let dst = self.remote_path(remote, rel);

            let src_size = match fs::metadata(&src) {
                Ok(m) => m.len(),
                Err(_) => {
                    results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::NotFound });
                    if progress(&ProgressEvent::NotFound { path: rel.clone() }) {
                        break;
                    }
                    continue;
                }
            };

            if !force && self.file_exists_and_is_of_size(remote, rel, src_size)? {
                results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::Skipped });
                if progress(&ProgressEvent::Skipped { path: rel.clone() }) {
                    break;
                }
                continue;
            }

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            if progress(&ProgressEvent::Started { path: rel.clone(), total_bytes: src_size }) {
                break;
            }
            fs::copy(&src, &dst)?;
            progress(&ProgressEvent::Bytes { path: rel.clone(), bytes: src_size });
            progress(&ProgressEvent::Completed { path: rel.clone() });
            results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::Uploaded });
        }
        Ok(results)
    }

    fn download(
        &self,
        remote: &str,
        rel_paths: &[String],
        to_dir: &Path,
        force: bool,
        mut progress: ProgressCallback<'_>,
    ) -> Result<Vec<TransferResult>> {
        let mut results = Vec::with_capacity(rel_paths.len());
        for rel in rel_paths {
            let src = self.remote_path(remote, rel);
            let dst = to_dir.join(rel);

            let src_size = match fs::metadata(&src) {
                Ok(m) => m.len(),
                Err(_) => {
                    results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::NotFound });
                    if progress(&ProgressEvent::NotFound { path: rel.clone() }) {
                        break;
                    }
                    continue;
                }
            };

            if !force {
                if let Ok(existing) = fs::metadata(&dst) {
                    if existing.len() == src_size {
                        results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::Skipped });
                        if progress(&ProgressEvent::Skipped { path: rel.clone() }) {
                            break;
                        }
                        continue;
                    }
                }
            }

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            if progress(&ProgressEvent::Started { path: rel.clone(), total_bytes: src_size }) {
                break;
            }
            fs::copy(&src, &dst)?;
            progress(&ProgressEvent::Bytes { path: rel.clone(), bytes: src_size });
            progress(&ProgressEvent::Completed { path: rel.clone() });
            results.push(TransferResult { path: rel.clone(), outcome: TransferOutcome::Downloaded });
        }
        Ok(results)
    }

    fn file_exists(&self, remote: &str, rel_path: &str) -> Result<bool> {
        Ok(self.remote_path(remote, rel_path).is_file())
    }

    fn file_exists_and_is_of_size(&self, remote: &str, rel_path: &str, size: u64) -> Result<bool> {
        // Any stat error (including not-found) means false, never
        // propagated as an error.
        Ok(fs::metadata(self.remote_path(remote, rel_path)).map(|m| m.len() == size).unwrap_or(false))
    }
}

impl SmartSyncProvider for FilesystemSyncProvider {
    fn query_caps(&self, _remote: &str) -> Result<Vec<Capability>> {
        Ok(vec![Capability::BinaryDelta])
    }

    fn lob_exists(&self, remote: &str, sha: &Sha1Hash) -> Result<(bool, u64)> {
        let path = meta_path(&self.remote_root(remote), sha);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let info = parse_meta(&text)?;
                Ok((true, info.size))
            }
            Err(_) => Ok((false, 0)),
        }
    }

    fn prepare_delta_for_download(
        &self,
        remote: &str,
        sha: &Sha1Hash,
        candidate_bases: &[Sha1Hash],
    ) -> Result<Option<(u64, Sha1Hash)>> {
        for base in candidate_bases {
            let delta_path = self.delta_path(remote, base, sha);
            if let Ok(meta) = fs::metadata(&delta_path) {
                return Ok(Some((meta.len(), *base)));
            }
        }
        Ok(None)
    }

    fn download_delta(
        &self,
        remote: &str,
        base_sha: &Sha1Hash,
        target_sha: &Sha1Hash,
        out: &mut dyn Write,
        mut progress: ProgressCallback<'_>,
    ) -> Result<()> {
        let path = self.delta_path(remote, base_sha, target_sha);
        let label = format!("{base_sha}..{target_sha}.delta");
        progress(&ProgressEvent::Started { path: label.clone(), total_bytes: fs::metadata(&path)?.len() });
        let mut f = fs::File::open(&path)?;
        std::io::copy(&mut f, out)?;
        progress(&ProgressEvent::Completed { path: label });
        Ok(())
    }

    fn upload_delta(
        &self,
        remote: &str,
        base_sha: &Sha1Hash,
        target_sha: &Sha1Hash,
        data: &mut dyn Read,
        size: u64,
        mut progress: ProgressCallback<'_>,
    ) -> Result<()> {
        let path = self.delta_path(remote, base_sha, target_sha);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let label = format!("{base_sha}..{target_sha}.delta");
        progress(&ProgressEvent::Started { path: label.clone(), total_bytes: size });
        let mut f = fs::File::create(&path)?;
        std::io::copy(data, &mut f)?;
        progress(&ProgressEvent::Completed { path: label });
        Ok(())
    }

    fn get_first_complete_lob_from_list(&self, remote: &str, candidates: &[Sha1Hash]) -> Result<Option<Sha1Hash>> {
        for sha in candidates {
            if self.lob_exists(remote, sha)?.0 {
                return Ok(Some(*sha));
            }
        }
        Ok(None)
    }
}
