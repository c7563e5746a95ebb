//! Index entry type.

use std::time::SystemTime;

use arbor_store::EntryMode;
use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

/// An entry in the staging index, representing a tracked file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Slash-separated path relative to the tree root.
    pub path: String,
    /// Content-addressed ID of the file's blob in the object store.
    pub object_id: ObjectId,
    /// File mode (regular, executable, symlink).
    pub mode: EntryMode,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl IndexEntry {
    /// Create a new index entry stamped with the current time.
    pub fn new(path: impl Into<String>, object_id: ObjectId, mode: EntryMode, size: u64) -> Self {
        Self {
            path: path.into(),
            object_id,
            mode,
            size,
            mtime: SystemTime::now(),
        }
    }

    /// Same entry with an explicit modification time.
    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = mtime;
        self
    }

    /// Whether `other` describes the same content at the same path, ignoring
    /// timestamps.
    pub fn same_content(&self, other: &IndexEntry) -> bool {
        self.path == other.path
            && self.object_id == other.object_id
            && self.mode == other.mode
            && self.size == other.size
    }
}
