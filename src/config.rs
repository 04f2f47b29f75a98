//! Read-only configuration record. Loading it from a file or the
//! environment is the front-end's job; the core only consumes the struct.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shared_store: Option<PathBuf>,
    pub auto_fetch_enabled: bool,

    pub fetch_commits_period_head: i64,
    pub fetch_commits_period_other: i64,
    pub fetch_refs_period_days: i64,

    pub fetch_include_paths: Vec<String>,
    pub fetch_exclude_paths: Vec<String>,

    pub fetch_deltas_above_size: u64,
    pub push_deltas_above_size: u64,

    pub retention_period_head: i64,
    pub retention_period_refs: i64,
    pub retention_period_other: i64,

    pub prune_check_remote: Option<String>,
    pub prune_safe_mode: bool,

    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shared_store: None,
            auto_fetch_enabled: true,
            fetch_commits_period_head: 7,
            fetch_commits_period_other: 0,
            fetch_refs_period_days: 90,
            fetch_include_paths: Vec::new(),
            fetch_exclude_paths: Vec::new(),
            fetch_deltas_above_size: 1024 * 1024,
            push_deltas_above_size: 1024 * 1024,
            retention_period_head: 0,
            retention_period_refs: 90,
            retention_period_other: 180,
            prune_check_remote: None,
            prune_safe_mode: true,
            dry_run: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Split a comma-separated glob list the way `fetchIncludePaths` /
    /// `fetchExcludePaths` are documented: `*` never crosses a path
    /// separator.
    pub fn parse_path_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
