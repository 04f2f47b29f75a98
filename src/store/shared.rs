//! Shared-store hard-linking. The shared store owns the canonical bytes;
//! local stores hold non-owning references realised as hard links. A
//! missing local reference with a present shared file is a fixable
//! condition, not an error.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::Result;

/// Establishes `local_path` as a hard link to `shared_path`, creating the
/// local parent directory first. Both paths must be on the same filesystem
///.
pub fn link_from_shared(shared_path: &Path, local_path: &Path) -> Result<()> {
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if local_path.exists() {
        return Ok(());
    }
    fs::hard_link(shared_path, local_path)?;
    Ok(())
}

/// Number of hard links currently pointing at `path`, used both to decide
/// whether a shared chunk can be deleted and to report
/// shared-store occupancy (scenario S6: "link count on the shared file
/// reports 2 while both repos hold it").
pub fn link_count(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.nlink())
}

/// True if `path` has no other referrer left (link count dropped to 1,
/// meaning only the shared copy's own directory entry remains).
pub fn is_orphaned(path: &Path) -> Result<bool> {
    Ok(link_count(path)? <= 1)
}
