//! Shared vocabulary for the Sync Orchestrator's flows.

use chrono::{DateTime, Utc};

use crate::hash::Sha1Hash;

/// Capability advertised by a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BinaryDelta,
}

/// Outcome of probing a single relative path or LOB on a remote during
/// upload/download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded,
    Downloaded,
    Skipped,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct TransferResult {
    pub path: String,
    pub outcome: TransferOutcome,
}

/// Per-commit completeness during push: a commit is
/// `Complete` only if every LOB it references is either already local and
/// correctly sized, or confirmed present on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitCompleteness {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct PushedCommit {
    pub commit: String,
    pub completeness: CommitCompleteness,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub not_found: Vec<Sha1Hash>,
    pub deltas_applied: Vec<Sha1Hash>,
}

#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub commits: Vec<PushedCommit>,
    pub uploaded: Vec<String>,
    pub deltas_uploaded: Vec<Sha1Hash>,
}

/// Checkout result for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutAction {
    Replaced,
    LeftUserModified,
    LeftMissing,
}

#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub filename: String,
    pub action: CheckoutAction,
}

/// `missing` classification.
#[derive(Debug, Clone)]
pub enum MissingStatus {
    MissingFixed,
    MissingAvailable,
    MissingCorrupt,
    MissingModified,
    MissingBlamed { commit: String, author: String, date: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct MissingReport {
    pub filename: String,
    pub sha: Sha1Hash,
    pub status: MissingStatus,
}

/// Prune breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMode {
    Unreferenced,
    Old,
    Shared,
}

#[derive(Debug, Clone, Default)]
pub struct PruneOutcome {
    pub removed: Vec<Sha1Hash>,
    pub retained_unpushed: Vec<Sha1Hash>,
}

#[derive(Debug, Clone, Default)]
pub struct FsckOutcome {
    pub checked: usize,
    pub corrupt: Vec<Sha1Hash>,
    pub deleted: Vec<Sha1Hash>,
}
