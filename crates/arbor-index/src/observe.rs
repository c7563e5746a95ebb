//! Hook for watching tree construction.

use arbor_types::ObjectId;

/// Receives a callback for every tree object the encoder persists.
pub trait TreeObserver {
    /// A directory at `path` (`""` for the root) was written as `id`.
    fn tree_written(&self, _path: &str, _id: &ObjectId, _entries: usize) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl TreeObserver for NoopObserver {}
