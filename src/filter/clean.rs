//! Clean direction: working copy → committed representation.

use std::io::{Read, Write};

use crate::error::Result;
use crate::store::ChunkedObjectStore;

use super::placeholder::{self, PLACEHOLDER_LEN};

/// Reads up to placeholder length from `input`; if it parses as a
/// placeholder, passes it through verbatim (the file was never expanded).
/// Otherwise the full stream (leader + remainder) is treated as binary and
/// stored, and `git-lob: <hash>` is written to `output`.
pub fn clean(store: &ChunkedObjectStore, mut input: impl Read, mut output: impl Write) -> Result<()> {
    let mut leader = vec![0u8; PLACEHOLDER_LEN];
    let mut leader_len = 0usize;
    while leader_len < leader.len() {
        let n = input.read(&mut leader[leader_len..])?;
        if n == 0 {
            break;
        }
        leader_len += n;
    }
    leader.truncate(leader_len);

    if let Some(_sha) = placeholder::parse(&leader) {
        output.write_all(&leader)?;
        return Ok(());
    }

    let info = store.store(&leader, input)?;
    output.write_all(placeholder::format(&info.sha).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_store() -> ChunkedObjectStore {
        let dir = tempdir().unwrap();
        ChunkedObjectStore::new(dir.path(), None).unwrap()
    }

    #[test]
    fn binary_content_is_stored_and_replaced_with_a_placeholder() {
        let store = new_store();
        let data = b"some binary content that is not a placeholder".to_vec();
        let mut out = Vec::new();
        clean(&store, data.as_slice(), &mut out).unwrap();

        let sha = placeholder::parse(&out).expect("output must be a placeholder");
        let mut retrieved = Vec::new();
        store.retrieve(&sha, &mut retrieved, false, None).unwrap();
        assert_eq!(retrieved, data);
    }

    #[test]
    fn existing_placeholder_passes_through_unchanged() {
        let store = new_store();
        let sha = crate::hash::Sha1Hash::compute(b"whatever");
        let placeholder_text = super::placeholder::format(&sha);

        let mut out = Vec::new();
        clean(&store, placeholder_text.as_bytes(), &mut out).unwrap();
        assert_eq!(out, placeholder_text.as_bytes());
    }
}
