//! Per-instance event hooks.
//!
//! Views, overlays and repositories report what they do through an injected
//! [`Observer`] rather than global state. [`TracingObserver`] forwards the
//! events to `tracing`.

use arbor_index::{NoopObserver, TreeObserver};
use arbor_types::ObjectId;
use tracing::{debug, info, warn};

/// Events emitted by the write path. All methods default to no-ops.
pub trait Observer: TreeObserver + Send + Sync {
    /// Blobs for buffered writes were stored and the index updated.
    fn staged(&self, _files: usize, _tree: &ObjectId) {}

    /// A commit object was written (the reference may not have moved yet).
    fn commit_created(&self, _commit: &ObjectId, _tree: &ObjectId, _parent: Option<&ObjectId>) {}

    /// `name` now points at `new`.
    fn ref_updated(&self, _name: &str, _old: Option<&ObjectId>, _new: &ObjectId) {}

    /// A compare-and-set on `name` lost a race; another attempt follows if
    /// any remain.
    fn ref_conflict(&self, _name: &str, _attempt: u32) {}

    /// Buffered writes were dropped, by a reset after commit/stage or by
    /// an explicit discard.
    fn overlay_reset(&self, _paths: usize) {}
}

impl Observer for NoopObserver {}

/// Observer that logs every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl TreeObserver for TracingObserver {
    fn tree_written(&self, path: &str, id: &ObjectId, entries: usize) {
        debug!(path = %crate::path::display(path), tree = %id.short_hex(), entries, "tree written");
    }
}

impl Observer for TracingObserver {
    fn staged(&self, files: usize, tree: &ObjectId) {
        info!(files, tree = %tree.short_hex(), "overlay staged");
    }

    fn commit_created(&self, commit: &ObjectId, tree: &ObjectId, parent: Option<&ObjectId>) {
        let parent = short_or_none(parent);
        info!(
            commit = %commit.short_hex(),
            tree = %tree.short_hex(),
            parent = %parent,
            "commit created"
        );
    }

    fn ref_updated(&self, name: &str, old: Option<&ObjectId>, new: &ObjectId) {
        let old = short_or_none(old);
        info!(
            name,
            old = %old,
            new = %new.short_hex(),
            "ref updated"
        );
    }

    fn ref_conflict(&self, name: &str, attempt: u32) {
        warn!(name, attempt, "ref update lost a race");
    }

    fn overlay_reset(&self, paths: usize) {
        debug!(paths, "overlay reset");
    }
}

fn short_or_none(id: Option<&ObjectId>) -> String {
    id.map_or_else(|| "none".to_string(), ObjectId::short_hex)
}
