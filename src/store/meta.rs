//! Meta record serialisation. Plain `key=value` lines, one field per line, no
//! framing — easy to hand-inspect, consistent with the PSC's own
//! deliberately-trivial on-disk format.

use crate::error::{LobError, Result};
use crate::hash::Sha1Hash;

use super::types::LobInfo;

pub fn serialize(info: &LobInfo) -> String {
    format!("sha={}\nsize={}\nnumChunks={}\n", info.sha, info.size, info.num_chunks)
}

pub fn parse(text: &str) -> Result<LobInfo> {
    let mut sha = None;
    let mut size = None;
    let mut num_chunks = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| LobError::Integrity(format!("malformed meta line: {line:?}")))?;
        match key {
            "sha" => sha = Some(Sha1Hash::from_hex(value)?),
            "size" => {
                size = Some(value.parse::<u64>().map_err(|e| {
                    LobError::Integrity(format!("invalid size {value:?}: {e}"))
                })?)
            }
            "numChunks" => {
                num_chunks = Some(value.parse::<u32>().map_err(|e| {
                    LobError::Integrity(format!("invalid numChunks {value:?}: {e}"))
                })?)
            }
            other => {
                return Err(LobError::Integrity(format!("unknown meta field {other:?}")))
            }
        }
    }

    let sha = sha.ok_or_else(|| LobError::Integrity("meta missing sha".into()))?;
    let size = size.ok_or_else(|| LobError::Integrity("meta missing size".into()))?;
    let num_chunks = num_chunks.ok_or_else(|| LobError::Integrity("meta missing numChunks".into()))?;

    let expected = super::types::num_chunks_for_size(size);
    if expected != num_chunks {
        return Err(LobError::Integrity(format!(
            "meta numChunks {num_chunks} does not match size {size} (expected {expected})"
        )));
    }

    Ok(LobInfo { sha, size, num_chunks })
}
