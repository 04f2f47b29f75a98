//! Chunked Object Store (COS). On-disk representation of a LOB
//! as `(meta, chunk[0..N-1])` under a content-addressed directory layout,
//! with optional transparent deduplication via a shared directory.
//!
//! Grounded on `casg::storage::CASGStorage` (chunk-dir dedup, temp-file
//! writes, rebuilt-from-disk index) generalized to fixed-size chunking, a
//! persisted meta record, and shared-store hard-link recovery.

mod layout;
mod meta;
mod shared;
mod types;

pub use layout::{chunk_path, ensure_splay_dir, meta_path};
pub use meta::parse as parse_meta;
pub use types::{CheckResult, LobInfo, CHUNK_SIZE};

/// Re-exports the splay-layout helpers under a test-only path so
/// integration tests can address a chunk/meta file directly without
/// depending on `ChunkedObjectStore` internals beyond its public surface.
#[cfg(test)]
pub mod layout_for_tests {
    pub use super::layout::*;
}

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::error::{LobError, Result};
use crate::hash::Sha1Hash;

/// Invoked by `Retrieve` when local validation fails and auto-fetch is
/// enabled. Returns once the single LOB has been
/// populated into the local store, or an error if it could not be fetched.
pub type FetchSingleHook<'a> = dyn Fn(&Sha1Hash) -> Result<()> + 'a;

pub struct ChunkedObjectStore {
    base_path: PathBuf,
    shared_path: Option<PathBuf>,
}

impl ChunkedObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, shared_path: Option<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        if let Some(shared) = &shared_path {
            fs::create_dir_all(shared)?;
        }
        Ok(Self { base_path, shared_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn write_root(&self) -> &Path {
        // New writes go to the shared path when configured.
        self.shared_path.as_deref().unwrap_or(&self.base_path)
    }

    /// `Store(stream, leaderBytes) → LOBInfo`. `leader` is any
    /// bytes already peeked from `reader` by a caller (the placeholder
    /// filter peeks the first `PLACEHOLDER_LEN` bytes to decide whether a
    /// stream looks like a placeholder before committing to treat it as
    /// binary) and must be treated as the start of the stream.
    #[instrument(skip(self, leader, reader))]
    pub fn store(&self, leader: &[u8], mut reader: impl Read) -> Result<LobInfo> {
        let staging = self.write_root().join(".staging");
        fs::create_dir_all(&staging)?;

        let mut hasher = Sha1Hash::hasher();
        let mut temp_chunks: Vec<(PathBuf, u64)> = Vec::new();
        let mut buf = vec![0u8; CHUNK_SIZE as usize];
        let mut leader_consumed = 0usize;
        let mut total_size = 0u64;

        loop {
            let mut filled = 0usize;
            // Drain any leftover leader bytes into this chunk first.
            if leader_consumed < leader.len() {
                let take = (leader.len() - leader_consumed).min(buf.len());
                buf[..take].copy_from_slice(&leader[leader_consumed..leader_consumed + take]);
                leader_consumed += take;
                filled += take;
            }
            while filled < buf.len() {
                let n = reader.read(&mut buf[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }

            hasher.update(&buf[..filled]);
            total_size += filled as u64;

            let mut temp = tempfile::NamedTempFile::new_in(&staging)?;
            temp.write_all(&buf[..filled])?;
            temp.flush()?;
            let (_, path) = temp.keep().map_err(|e| LobError::Internal(e.to_string()))?;
            temp_chunks.push((path, filled as u64));

            if (filled as u64) < CHUNK_SIZE {
                break;
            }
        }

        let sha = hasher.finish();
        let info = LobInfo::new(sha, total_size);
        debug!(sha = %sha, size = total_size, chunks = info.num_chunks, "computed LOB hash");

        layout::ensure_splay_dir(self.write_root(), &sha)?;
        for (index, (temp_path, size)) in temp_chunks.into_iter().enumerate() {
            self.publish_chunk(&sha, index as u32, &temp_path, size)?;
        }

        let meta_path = layout::meta_path(self.write_root(), &sha);
        fs::write(&meta_path, meta::serialize(&info))?;

        if let Some(shared) = &self.shared_path {
            // New writes landed in `shared`; establish the local hard link.
            for index in 0..info.num_chunks {
                let shared_chunk = layout::chunk_path(shared, &sha, index);
                let local_chunk = layout::chunk_path(&self.base_path, &sha, index);
                shared::link_from_shared(&shared_chunk, &local_chunk)?;
            }
            let shared_meta = layout::meta_path(shared, &sha);
            let local_meta = layout::meta_path(&self.base_path, &sha);
            shared::link_from_shared(&shared_meta, &local_meta)?;
        }

        Ok(info)
    }

    /// `StoreChunkInBaseDir(sha, i, tempPath, size)`: idempotent
    /// publishing with a size-check skip — if a correctly sized file
    /// already exists at the final path, the temp file is discarded rather
    /// than overwriting (size-equality is the correctness check, per §4.1
    /// and the concurrent-writer note in §3).
    pub fn publish_chunk(
        &self,
        sha: &Sha1Hash,
        index: u32,
        temp_path: &Path,
        size: u64,
    ) -> Result<()> {
        let root = self.write_root();
        layout::ensure_splay_dir(root, sha)?;
        let final_path = layout::chunk_path(root, sha, index);

        if let Ok(existing) = fs::metadata(&final_path) {
            if existing.len() == size {
                let _ = fs::remove_file(temp_path);
                return Ok(());
            }
        }
        fs::rename(temp_path, &final_path)?;
        Ok(())
    }

    /// `GetInfo(sha) → LOBInfo | NotFound`.
    pub fn get_info(&self, sha: &Sha1Hash) -> Result<LobInfo> {
        let path = layout::meta_path(&self.base_path, sha);
        let text = fs::read_to_string(&path)
            .map_err(|_| LobError::NotFound(format!("meta for {sha}")))?;
        meta::parse(&text)
    }

    /// `Retrieve(sha, outStream) → LOBInfo`. Pre-validates
    /// every chunk (existence + expected size) before writing a byte to
    /// `out`, preserving the all-or-nothing contract the smudge filter
    /// relies on. Shared-store recovery is attempted first; then, if still
    /// invalid and auto-fetch is enabled, the fetch hook is invoked once.
    #[instrument(skip(self, out, fetch_hook))]
    pub fn retrieve(
        &self,
        sha: &Sha1Hash,
        mut out: impl Write,
        auto_fetch: bool,
        fetch_hook: Option<&FetchSingleHook>,
    ) -> Result<LobInfo> {
        self.recover_from_shared(sha)?;

        let info = match self.get_info(sha) {
            Ok(info) => info,
            Err(e) if e.is_not_found() && auto_fetch => {
                self.run_fetch_hook(sha, fetch_hook)?;
                self.recover_from_shared(sha)?;
                self.get_info(sha)?
            }
            Err(e) => return Err(e),
        };

        match self.check_files(sha, false)? {
            CheckResult::Ok => {}
            _ if auto_fetch => {
                self.run_fetch_hook(sha, fetch_hook)?;
                self.recover_from_shared(sha)?;
                if self.check_files(sha, false)? != CheckResult::Ok {
                    return Err(LobError::NotFound(sha.to_hex()));
                }
            }
            CheckResult::NotFound => return Err(LobError::NotFound(sha.to_hex())),
            CheckResult::WrongSize => {
                return Err(LobError::WrongSize { sha: *sha, expected: info.size, found: 0 })
            }
            CheckResult::IntegrityError => {
                return Err(LobError::Integrity(format!("corrupt LOB {sha}")))
            }
        }

        for index in 0..info.num_chunks {
            let path = layout::chunk_path(&self.base_path, sha, index);
            let mut file = fs::File::open(&path)?;
            std::io::copy(&mut file, &mut out)?;
        }
        Ok(info)
    }

    fn run_fetch_hook(&self, sha: &Sha1Hash, hook: Option<&FetchSingleHook>) -> Result<()> {
        match hook {
            Some(hook) => hook(sha),
            None => Err(LobError::NotFound(sha.to_hex())),
        }
    }

    /// `Delete(sha)`. Removes only the local meta + chunks (or the local
    /// hard links into a shared store); a shared copy that becomes orphaned
    /// as a result is left for `prune_shared` to reclaim, so repeated
    /// deletes from different local stores never race each other over the
    /// same shared file.
    pub fn delete(&self, sha: &Sha1Hash) -> Result<()> {
        let info = self.get_info(sha).ok();
        let num_chunks = info.map(|i| i.num_chunks).unwrap_or_else(|| self.guess_chunk_count(sha));

        for index in 0..num_chunks {
            let local_chunk = layout::chunk_path(&self.base_path, sha, index);
            let _ = fs::remove_file(&local_chunk);
        }
        let local_meta = layout::meta_path(&self.base_path, sha);
        let _ = fs::remove_file(&local_meta);
        Ok(())
    }

    /// All SHAs with a meta record somewhere under the local splay tree.
    pub fn all_local_shas(&self) -> Vec<Sha1Hash> {
        shas_under(&self.base_path)
    }

    /// Paths (relative to `base_path`) for a LOB's meta record and every
    /// chunk, in `[meta, chunk0, chunk1, ...]` order. When `sha` is not yet
    /// known locally only the meta entry is returned, since the chunk count
    /// can't be known until the meta record itself has been fetched.
    pub fn splay_relative_paths(&self, sha: &Sha1Hash) -> Vec<String> {
        let relativize = |p: PathBuf| p.to_string_lossy().replace('\\', "/");
        let mut paths = vec![relativize(layout::meta_path(Path::new(""), sha))];
        let num_chunks = self.get_info(sha).map(|i| i.num_chunks).unwrap_or(0);
        for index in 0..num_chunks {
            paths.push(relativize(layout::chunk_path(Path::new(""), sha, index)));
        }
        paths
    }

    /// Locally-complete SHAs (shallow check passes), usable as delta bases
    /// when asking a remote to prepare a delta or diffing against history.
    pub fn local_candidate_bases(&self) -> Vec<Sha1Hash> {
        self.all_local_shas()
            .into_iter()
            .filter(|sha| matches!(self.check_files(sha, false), Ok(CheckResult::Ok)))
            .collect()
    }

    /// Sweeps the shared store for entries whose hard-link count has
    /// dropped to 1 (no local store references them any more) and removes
    /// them, returning the SHAs that were reclaimed. A no-op, returning no
    /// removed SHAs, when no shared store is configured.
    pub fn prune_shared(&self) -> Result<Vec<Sha1Hash>> {
        let Some(shared) = &self.shared_path else { return Ok(Vec::new()) };

        let mut removed = Vec::new();
        for sha in shas_under(shared) {
            let meta_file = layout::meta_path(shared, &sha);
            if !shared::is_orphaned(&meta_file).unwrap_or(false) {
                continue;
            }

            let num_chunks = fs::read_to_string(&meta_file)
                .ok()
                .and_then(|text| meta::parse(&text).ok())
                .map(|info| info.num_chunks)
                .unwrap_or(0);
            for index in 0..num_chunks {
                let _ = fs::remove_file(layout::chunk_path(shared, &sha, index));
            }
            let _ = fs::remove_file(&meta_file);
            removed.push(sha);
        }
        Ok(removed)
    }

    fn guess_chunk_count(&self, sha: &Sha1Hash) -> u32 {
        let mut count = 0;
        while layout::chunk_path(&self.base_path, sha, count).exists() {
            count += 1;
        }
        count
    }

    /// `CheckFiles(sha, deep) → ok | NotFound | WrongSize | IntegrityError`
    ///. The shallow check first attempts shared-store recovery
    /// before reporting NotFound/WrongSize.
    #[instrument(skip(self))]
    pub fn check_files(&self, sha: &Sha1Hash, deep: bool) -> Result<CheckResult> {
        self.recover_from_shared(sha)?;

        let info = match self.get_info(sha) {
            Ok(info) => info,
            Err(_) => return Ok(CheckResult::NotFound),
        };

        let mut hasher = deep.then(Sha1Hash::hasher);
        for index in 0..info.num_chunks {
            let path = layout::chunk_path(&self.base_path, sha, index);
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(_) => return Ok(CheckResult::NotFound),
            };
            let expected_len = info.chunk_len(index).unwrap_or(0);
            if metadata.len() != expected_len {
                return Ok(CheckResult::WrongSize);
            }
            if let Some(hasher) = hasher.as_mut() {
                let mut buf = Vec::with_capacity(expected_len as usize);
                fs::File::open(&path)?.read_to_end(&mut buf)?;
                hasher.update(&buf);
            }
        }

        if let Some(hasher) = hasher {
            let computed = hasher.finish();
            if computed != *sha {
                warn!(expected = %sha, computed = %computed, "deep check hash mismatch");
                return Ok(CheckResult::IntegrityError);
            }
        }

        Ok(CheckResult::Ok)
    }

    /// `IsMissing(sha) → bool`.
    pub fn is_missing(&self, sha: &Sha1Hash) -> Result<bool> {
        Ok(self.check_files(sha, false)? != CheckResult::Ok)
    }

    /// `IsLocalEmpty() → bool`: true if the local LOB root has
    /// no entries. Used by PSC's `InitSuccessfullyPushedCacheIfAppropriate`
    /// short-circuit.
    pub fn is_local_empty(&self) -> Result<bool> {
        match fs::read_dir(&self.base_path) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// `recoverLocalLOBFilesFromSharedStore`: re-establishes any broken local hard links from the
    /// shared copy. A no-op if no shared store is configured.
    pub fn recover_from_shared(&self, sha: &Sha1Hash) -> Result<()> {
        let Some(shared) = &self.shared_path else { return Ok(()) };

        let shared_meta = layout::meta_path(shared, sha);
        if shared_meta.exists() {
            let local_meta = layout::meta_path(&self.base_path, sha);
            shared::link_from_shared(&shared_meta, &local_meta)?;

            if let Ok(info) = self.get_info(sha) {
                for index in 0..info.num_chunks {
                    let shared_chunk = layout::chunk_path(shared, sha, index);
                    let local_chunk = layout::chunk_path(&self.base_path, sha, index);
                    if shared_chunk.exists() && !local_chunk.exists() {
                        shared::link_from_shared(&shared_chunk, &local_chunk)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Walks a splay-layout root (two levels of 3-hex-char directories) and
/// collects the SHA of every `*_meta` file found. Missing or unreadable
/// directories simply contribute nothing, matching the other best-effort
/// filesystem sweeps in this module.
fn shas_under(dir: &Path) -> Vec<Sha1Hash> {
    let mut out = Vec::new();
    let Ok(level0) = fs::read_dir(dir) else { return out };
    for entry0 in level0.flatten() {
        let path0 = entry0.path();
        if !path0.is_dir() {
            continue;
        }
        let Ok(level1) = fs::read_dir(&path0) else { continue };
        for entry1 in level1.flatten() {
            let path1 = entry1.path();
            if !path1.is_dir() {
                continue;
            }
            let Ok(files) = fs::read_dir(&path1) else { continue };
            for file in files.flatten() {
                let name = file.file_name();
                let Some(hex) = name.to_string_lossy().strip_suffix("_meta").map(str::to_string) else {
                    continue;
                };
                if let Ok(sha) = Sha1Hash::from_hex(&hex) {
                    out.push(sha);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_bytes(store: &ChunkedObjectStore, data: &[u8]) -> LobInfo {
        store.store(&[], data).unwrap()
    }

    #[test]
    fn store_and_retrieve_round_trips() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let data = b"hello large binary object".repeat(1000);
        let info = store_bytes(&store, &data);

        let mut out = Vec::new();
        let got = store.retrieve(&info.sha, &mut out, false, None).unwrap();
        assert_eq!(got, info);
        assert_eq!(out, data);
    }

    #[test]
    fn store_dedups_identical_content() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let data = b"same bytes".to_vec();
        let a = store_bytes(&store, &data);
        let b = store_bytes(&store, &data);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_lob_has_no_chunk_files() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let info = store_bytes(&store, b"");
        assert_eq!(info.num_chunks, 0);
        assert_eq!(info.size, 0);
        assert_eq!(store.check_files(&info.sha, true).unwrap(), CheckResult::Ok);
    }

    #[test]
    fn check_files_detects_wrong_size_and_deep_corruption() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let info = store_bytes(&store, &vec![7u8; 1024]);

        assert_eq!(store.check_files(&info.sha, false).unwrap(), CheckResult::Ok);
        assert_eq!(store.check_files(&info.sha, true).unwrap(), CheckResult::Ok);

        let chunk_path = layout::chunk_path(store.base_path(), &info.sha, 0);
        let mut bytes = fs::read(&chunk_path).unwrap();
        bytes.truncate(bytes.len() - 1);
        fs::write(&chunk_path, &bytes).unwrap();
        assert_eq!(store.check_files(&info.sha, false).unwrap(), CheckResult::WrongSize);
    }

    #[test]
    fn check_files_deep_detects_single_byte_flip_without_size_change() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let info = store_bytes(&store, &vec![7u8; 1024]);

        let chunk_path = layout::chunk_path(store.base_path(), &info.sha, 0);
        let mut bytes = fs::read(&chunk_path).unwrap();
        bytes[10] ^= 0xFF;
        fs::write(&chunk_path, &bytes).unwrap();

        assert_eq!(store.check_files(&info.sha, false).unwrap(), CheckResult::Ok);
        assert_eq!(store.check_files(&info.sha, true).unwrap(), CheckResult::IntegrityError);
    }

    #[test]
    fn is_local_empty_reports_correctly() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        assert!(store.is_local_empty().unwrap());
        store_bytes(&store, b"x");
        assert!(!store.is_local_empty().unwrap());
    }

    #[test]
    fn shared_store_hard_links_into_local_and_survives_local_deletion() {
        let dir = tempdir().unwrap();
        let shared = dir.path().join("shared");
        let repo_a = ChunkedObjectStore::new(dir.path().join("a"), Some(shared.clone())).unwrap();
        let repo_b = ChunkedObjectStore::new(dir.path().join("b"), Some(shared.clone())).unwrap();

        let data = vec![3u8; 1024];
        let info = repo_a.store(&[], data.as_slice()).unwrap();
        repo_b.recover_from_shared(&info.sha).unwrap();

        let chunk_in_b = layout::chunk_path(repo_b.base_path(), &info.sha, 0);
        assert!(chunk_in_b.exists());

        let shared_chunk = layout::chunk_path(&shared, &info.sha, 0);
        assert_eq!(shared::link_count(&shared_chunk).unwrap(), 3); // shared + a + b

        repo_a.delete(&info.sha).unwrap();
        assert!(chunk_in_b.exists(), "repo B's hard link must survive repo A's delete");
    }

    #[test]
    fn retrieve_is_all_or_nothing_when_a_chunk_is_missing() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let data = vec![9u8; (CHUNK_SIZE + 10) as usize];
        let info = store_bytes(&store, &data);

        let second_chunk = layout::chunk_path(store.base_path(), &info.sha, 1);
        fs::remove_file(&second_chunk).unwrap();

        let mut out = Vec::new();
        let err = store.retrieve(&info.sha, &mut out, false, None).unwrap_err();
        assert!(err.is_not_found());
        assert!(out.is_empty(), "no bytes should be written before full validation succeeds");
    }

    #[test]
    fn retrieve_falls_back_to_fetch_hook_on_not_found() {
        let dir = tempdir().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let data = b"fetched on demand".to_vec();
        let sha = Sha1Hash::compute(&data);

        let hook_data = data.clone();
        let hook_store_path = store.base_path().to_path_buf();
        let hook = move |want: &Sha1Hash| -> Result<()> {
            assert_eq!(*want, sha);
            let store = ChunkedObjectStore::new(&hook_store_path, None)?;
            store.store(&[], hook_data.as_slice())?;
            Ok(())
        };

        let mut out = Vec::new();
        let info = store.retrieve(&sha, &mut out, true, Some(&hook)).unwrap();
        assert_eq!(info.sha, sha);
        assert_eq!(out, data);
    }
}
