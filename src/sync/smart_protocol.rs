//! Smart-transport wire types. The core ships no transport implementing this protocol — a
//! real smart remote is out of scope per §1 — only the request/response
//! shapes a future transport would serialize, plus round-trip tests so the
//! shapes stay stable as the `SmartSyncProvider` trait evolves.

use serde::{Deserialize, Serialize};

use crate::hash::Sha1Hash;

/// One file within a LOB, addressed the way the protocol's methods take
/// `(lobSha, type, chunkIdx)` triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobFileKind {
    Meta,
    Chunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum SmartRpcMethod {
    QueryCaps,
    SetCaps { caps: Vec<String> },
    FileExists { lob_sha: Sha1Hash, kind: LobFileKind, chunk_idx: u32 },
    FileExistsOfSize { lob_sha: Sha1Hash, kind: LobFileKind, chunk_idx: u32, size: u64 },
    UploadFile { lob_sha: Sha1Hash, kind: LobFileKind, chunk_idx: u32, size: u64 },
    DownloadFile { lob_sha: Sha1Hash, kind: LobFileKind, chunk_idx: u32 },
    HasCompleteLob { candidates: Vec<Sha1Hash> },
    DownloadDeltaPrepare { base: Sha1Hash, target: Sha1Hash },
    DownloadDelta { base: Sha1Hash, target: Sha1Hash, size_limit: u64 },
    UploadDelta { base: Sha1Hash, target: Sha1Hash, size: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SmartRpcResponse {
    Ok,
    Bool { value: bool },
    Caps { caps: Vec<String> },
    Size { bytes: u64 },
    CompleteLob { sha: Option<Sha1Hash> },
    Error { message: String },
}
