//! On-disk directory layout. Two splay
//! levels of three hex characters each keep directory fan-out bounded:
//! `H[0:3]/H[3:6]/H_meta` and `H[0:3]/H[3:6]/H_<i>`.

use std::path::{Path, PathBuf};

use crate::hash::Sha1Hash;

fn splay_dir(base: &Path, sha: &Sha1Hash) -> PathBuf {
    let hex = sha.to_hex();
    base.join(&hex[0..3]).join(&hex[3..6])
}

pub fn meta_path(base: &Path, sha: &Sha1Hash) -> PathBuf {
    let hex = sha.to_hex();
    splay_dir(base, sha).join(format!("{hex}_meta"))
}

pub fn chunk_path(base: &Path, sha: &Sha1Hash, index: u32) -> PathBuf {
    let hex = sha.to_hex();
    splay_dir(base, sha).join(format!("{hex}_{index}"))
}

pub fn ensure_splay_dir(base: &Path, sha: &Sha1Hash) -> std::io::Result<PathBuf> {
    let dir = splay_dir(base, sha);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
