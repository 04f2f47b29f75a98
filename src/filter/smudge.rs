//! Smudge direction: committed representation → working copy.

use std::io::{Read, Write};

use crate::error::Result;
use crate::store::{ChunkedObjectStore, FetchSingleHook};

use super::placeholder::{self, PLACEHOLDER_LEN};

/// Reads up to placeholder length from `input`; if it parses as a
/// placeholder, retrieves the real bytes (optionally auto-fetching on
/// NotFound) and writes them to `output`. If retrieval still fails, falls
/// back to writing the placeholder through verbatim so a later `checkout`
/// or `missing` can repair it. Any non-placeholder stream is passed through
/// unchanged — never mangle an accidentally-small real file.
pub fn smudge(
    store: &ChunkedObjectStore,
    mut input: impl Read,
    mut output: impl Write,
    auto_fetch: bool,
    fetch_hook: Option<&FetchSingleHook>,
) -> Result<()> {
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

    let Some(sha) = placeholder::parse(&leader) else {
        output.write_all(&leader)?;
        std::io::copy(&mut input, &mut output)?;
        return Ok(());
    };

    match store.retrieve(&sha, &mut output, auto_fetch, fetch_hook) {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            output.write_all(&leader)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
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
    fn expands_a_known_placeholder() {
        let store = new_store();
        let data = b"real content".to_vec();
        let info = store.store(&[], data.as_slice()).unwrap();
        let placeholder_text = placeholder::format(&info.sha);

        let mut out = Vec::new();
        smudge(&store, placeholder_text.as_bytes(), &mut out, false, None).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn falls_back_to_placeholder_text_when_content_missing() {
        let store = new_store();
        let sha = crate::hash::Sha1Hash::compute(b"never stored");
        let placeholder_text = placeholder::format(&sha);

        let mut out = Vec::new();
        smudge(&store, placeholder_text.as_bytes(), &mut out, false, None).unwrap();
        assert_eq!(out, placeholder_text.as_bytes());
    }

    #[test]
    fn non_placeholder_stream_passes_through_unchanged() {
        let store = new_store();
        let data = b"short".to_vec();
        let mut out = Vec::new();
        smudge(&store, data.as_slice(), &mut out, false, None).unwrap();
        assert_eq!(out, data);
    }
}
