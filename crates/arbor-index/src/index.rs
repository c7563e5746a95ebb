//! The staging index: a flat map from path to blob, turned into trees on
//! demand.
//!
//! [`StagingIndex`] keeps a `BTreeMap<String, IndexEntry>`. Entries are
//! unique per path; ordering inside trees is imposed when the tree is
//! built, not here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use arbor_store::{EntryMode, ObjectStore, ObjectStoreExt};
use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};
use crate::index_store::IndexStore;
use crate::observe::TreeObserver;
use crate::tree_builder::{join_path, split_path, PathIndexer, TreeEncoder};

/// Version tag written into serialized indexes.
pub const INDEX_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
}

/// The staging index.
///
/// Purely in-memory; [`StagingIndex::load`] and [`StagingIndex::save`] move
/// it through an [`IndexStore`]. The object store is used for writing blobs
/// and trees and for reading trees back.
pub struct StagingIndex {
    entries: BTreeMap<String, IndexEntry>,
    /// Root tree for the current entries, if already built.
    tree_cache: Option<ObjectId>,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for StagingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingIndex")
            .field("entries", &self.entries.len())
            .field("tree_cache", &self.tree_cache)
            .finish()
    }
}

impl StagingIndex {
    /// Empty index writing blobs and trees into `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            entries: BTreeMap::new(),
            tree_cache: None,
            store,
        }
    }

    /// Number of staged files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// All entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Root tree ID of the last `write_tree`/`read_tree`, if nothing changed
    /// since.
    pub fn cached_tree(&self) -> Option<ObjectId> {
        self.tree_cache
    }

    /// Store `content` as a blob and stage it at `path`.
    pub fn stage_file(
        &mut self,
        path: &str,
        content: &[u8],
        mode: EntryMode,
    ) -> IndexResult<ObjectId> {
        self.stage_file_at(path, content, mode, SystemTime::now())
    }

    /// Like [`stage_file`](Self::stage_file), recording `mtime` as the
    /// modification time.
    pub fn stage_file_at(
        &mut self,
        path: &str,
        content: &[u8],
        mode: EntryMode,
        mtime: SystemTime,
    ) -> IndexResult<ObjectId> {
        let object_id = self.store.write_blob(content)?;
        let entry = IndexEntry::new(path, object_id, mode, content.len() as u64).with_mtime(mtime);
        self.stage_entry(entry)?;
        Ok(object_id)
    }

    /// Stage an object that is already in the store.
    pub fn stage_object(
        &mut self,
        path: &str,
        object_id: ObjectId,
        mode: EntryMode,
        size: u64,
    ) -> IndexResult<()> {
        self.stage_entry(IndexEntry::new(path, object_id, mode, size))
    }

    /// Insert or replace a fully formed entry.
    ///
    /// Returns without touching the tree cache if an entry with the same
    /// content is already staged at that path.
    pub fn stage_entry(&mut self, entry: IndexEntry) -> IndexResult<()> {
        split_path(&entry.path)?;
        if entry.mode.is_dir() {
            return Err(IndexError::InvalidMode {
                path: entry.path,
                mode: entry.mode,
            });
        }
        if self
            .entries
            .get(&entry.path)
            .is_some_and(|existing| existing.same_content(&entry))
        {
            return Ok(());
        }
        self.entries.insert(entry.path.clone(), entry);
        self.tree_cache = None;
        Ok(())
    }

    /// Unstage `path`.
    pub fn remove(&mut self, path: &str) -> IndexResult<IndexEntry> {
        let removed = self
            .entries
            .remove(path)
            .ok_or_else(|| IndexError::PathNotFound(path.to_string()))?;
        self.tree_cache = None;
        Ok(removed)
    }

    /// Drop every entry for which `keep` returns `false`. Returns how many
    /// entries were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&IndexEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.tree_cache = None;
        }
        removed
    }

    /// Build the Merkle tree for all entries and return its root ID.
    pub fn write_tree(&mut self) -> IndexResult<ObjectId> {
        self.write_tree_observed(&crate::observe::NoopObserver)
    }

    /// Same as [`StagingIndex::write_tree`], reporting each written tree.
    pub fn write_tree_observed<O: ?Sized + TreeObserver>(
        &mut self,
        observer: &O,
    ) -> IndexResult<ObjectId> {
        if let Some(id) = self.tree_cache {
            return Ok(id);
        }
        let mut indexer = PathIndexer::new();
        for entry in self.entries.values() {
            indexer.add_file(&entry.path, entry.mode, entry.object_id)?;
        }
        let root = TreeEncoder::with_observer(self.store.as_ref(), observer).encode(&indexer)?;
        self.tree_cache = Some(root);
        Ok(root)
    }

    /// Replace the index contents with every file reachable from `tree_id`.
    ///
    /// Subtrees are flattened into slash-separated paths. Sizes are looked
    /// up in the object store; empty directories leave no trace.
    pub fn read_tree(&mut self, tree_id: &ObjectId) -> IndexResult<()> {
        let mut entries = BTreeMap::new();
        let now = SystemTime::now();
        self.collect_tree(tree_id, "", now, &mut entries)?;
        debug!(tree = %tree_id.short_hex(), files = entries.len(), "index read from tree");
        self.entries = entries;
        self.tree_cache = Some(*tree_id);
        Ok(())
    }

    fn collect_tree(
        &self,
        tree_id: &ObjectId,
        prefix: &str,
        mtime: SystemTime,
        out: &mut BTreeMap<String, IndexEntry>,
    ) -> IndexResult<()> {
        let tree = self.store.read_tree(tree_id)?;
        for te in &tree.entries {
            let path = join_path(prefix, &te.name);
            if te.mode.is_dir() {
                self.collect_tree(&te.object_id, &path, mtime, out)?;
                continue;
            }
            let size = self
                .store
                .object_size(&te.object_id)?
                .ok_or(IndexError::ObjectNotFound(te.object_id))?;
            let entry =
                IndexEntry::new(path.clone(), te.object_id, te.mode, size).with_mtime(mtime);
            out.insert(path, entry);
        }
        Ok(())
    }

    /// Serialize the entries with bincode.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        let file = IndexFile {
            version: INDEX_VERSION,
            entries: self.entries.values().cloned().collect(),
        };
        bincode::serialize(&file).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Decode an index produced by [`StagingIndex::to_bytes`].
    pub fn from_bytes(store: Arc<dyn ObjectStore>, bytes: &[u8]) -> IndexResult<Self> {
        let file: IndexFile =
            bincode::deserialize(bytes).map_err(|e| IndexError::Serialization(e.to_string()))?;
        if file.version != INDEX_VERSION {
            return Err(IndexError::Serialization(format!(
                "unsupported index version {}",
                file.version
            )));
        }
        let mut index = Self::new(store);
        for entry in file.entries {
            index.entries.insert(entry.path.clone(), entry);
        }
        Ok(index)
    }

    /// Load the index from `index_store`, or start empty if none was saved.
    pub fn load(store: Arc<dyn ObjectStore>, index_store: &dyn IndexStore) -> IndexResult<Self> {
        match index_store.read_index()? {
            Some(bytes) => Self::from_bytes(store, &bytes),
            None => Ok(Self::new(store)),
        }
    }

    /// Persist the index to `index_store`.
    pub fn save(&self, index_store: &dyn IndexStore) -> IndexResult<()> {
        index_store.write_index(&self.to_bytes()?)?;
        debug!(entries = self.entries.len(), "index saved");
        Ok(())
    }
}
