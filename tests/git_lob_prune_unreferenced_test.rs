//! Rounds out the end-to-end scenario pack beyond S1–S6 with the
//! orchestrator's prune operation, not separately covered by a lettered
//! scenario.

mod common;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use lob_core::config::Config;
use lob_core::filter::format_placeholder;
use lob_core::history::DiffLineKind;
use lob_core::push_state::PushStateCache;
use lob_core::store::ChunkedObjectStore;
use lob_core::sync::{prune, PruneMode, PruneRequest};

use common::{filler_bytes, FakeCommit, FakeVcs};

fn day(offset_days: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(offset_days)
}

#[test]
fn prune_unreferenced_keeps_only_what_head_still_names() {
    let dir = tempdir().unwrap();
    let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
    let kept = store.store(&[], filler_bytes(50, 1).as_slice()).unwrap();
    let orphaned = store.store(&[], filler_bytes(50, 2).as_slice()).unwrap();

    let placeholder = format_placeholder(&kept.sha);
    let vcs = FakeVcs::new(vec![FakeCommit {
        hash: "c1".to_string(),
        date: day(0),
        tree: vec![("kept.bin".to_string(), placeholder.clone().into_bytes())],
        diff: vec![("kept.bin".to_string(), DiffLineKind::Added, placeholder.clone())],
    }]);

    let req = PruneRequest { mode: PruneMode::Unreferenced, dry_run: false };
    let psc_dir = tempdir().unwrap();
    let psc = PushStateCache::new(psc_dir.path());
    let outcome = prune(&vcs, &store, &psc, None, &Config::default(), &req).unwrap();

    assert_eq!(outcome.removed, vec![orphaned.sha]);
    assert!(!store.is_missing(&kept.sha).unwrap());
}
