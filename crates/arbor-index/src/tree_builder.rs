//! Building Merkle trees from flat path listings.
//!
//! [`PathIndexer`] turns `(path, mode, hash)` triples into a skeleton of
//! directory records, one per directory path. [`TreeEncoder`] then walks that
//! skeleton bottom-up, writing each directory as a [`Tree`] object and
//! patching the resulting hash into its parent.

use std::collections::{BTreeMap, HashMap};

use arbor_store::{EntryMode, ObjectStore, ObjectStoreExt, Tree, TreeEntry};
use arbor_types::ObjectId;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::observe::{NoopObserver, TreeObserver};

/// Path of the root directory in the skeleton.
pub const ROOT: &str = "";

/// Split a slash-separated relative path into its segments.
///
/// Rejects empty paths, leading or trailing slashes, empty segments, and
/// `.`/`..` segments.
pub fn split_path(path: &str) -> IndexResult<Vec<&str>> {
    let invalid = |reason: &str| IndexError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    let segments: Vec<&str> = path.split('/').collect();
    for seg in &segments {
        match *seg {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative segment")),
            _ => {}
        }
    }
    Ok(segments)
}

/// Join a directory path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// A child slot inside a directory record. Directories carry no hash until
/// the encoder has written them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    pub name: String,
    pub mode: EntryMode,
    pub object_id: Option<ObjectId>,
}

#[derive(Debug, Default)]
struct DirRecord {
    children: Vec<PendingEntry>,
}

/// In-memory directory skeleton keyed by directory path.
///
/// Every prefix of every registered path is registered as a directory in
/// its own parent, so insertion order does not matter. Registering the same
/// path twice is a no-op; using one path as both a file and a directory is a
/// [`IndexError::PathConflict`].
#[derive(Debug)]
pub struct PathIndexer {
    dirs: BTreeMap<String, DirRecord>,
    known: HashMap<String, EntryMode>,
    files: usize,
}

impl Default for PathIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathIndexer {
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(ROOT.to_string(), DirRecord::default());
        Self {
            dirs,
            known: HashMap::new(),
            files: 0,
        }
    }

    /// Register a file (regular, executable or symlink) at `path`.
    pub fn add_file(
        &mut self,
        path: &str,
        mode: EntryMode,
        object_id: ObjectId,
    ) -> IndexResult<()> {
        self.add_entry(path, mode, Some(object_id))
    }

    /// Register a non-directory entry whose content hash may not be known.
    ///
    /// An entry left without a hash makes [`TreeEncoder::encode`] fail with
    /// [`IndexError::MissingContent`].
    pub fn add_entry(
        &mut self,
        path: &str,
        mode: EntryMode,
        object_id: Option<ObjectId>,
    ) -> IndexResult<()> {
        if mode.is_dir() {
            return Err(IndexError::InvalidMode {
                path: path.to_string(),
                mode,
            });
        }
        self.register(path, Some((mode, object_id)))
    }

    /// Register a directory, so that it appears in the tree even when empty.
    pub fn add_dir(&mut self, path: &str) -> IndexResult<()> {
        self.register(path, None)
    }

    fn register(
        &mut self,
        path: &str,
        terminal: Option<(EntryMode, Option<ObjectId>)>,
    ) -> IndexResult<()> {
        let segments = split_path(path)?;
        let last = segments.len() - 1;
        let mut parent = ROOT.to_string();

        for (i, seg) in segments.iter().enumerate() {
            let full = join_path(&parent, seg);
            let file = if i == last { terminal } else { None };

            match (self.known.get(&full).copied(), file) {
                (Some(existing), None) if !existing.is_dir() => {
                    return Err(IndexError::PathConflict {
                        path: full,
                        reason: "already registered as a file".into(),
                    });
                }
                (Some(existing), Some(_)) if existing.is_dir() => {
                    return Err(IndexError::PathConflict {
                        path: full,
                        reason: "already registered as a directory".into(),
                    });
                }
                (Some(_), _) => {}
                (None, None) => {
                    self.insert_child(&parent, seg, EntryMode::Directory, None);
                    self.dirs.insert(full.clone(), DirRecord::default());
                    self.known.insert(full.clone(), EntryMode::Directory);
                }
                (None, Some((mode, object_id))) => {
                    self.insert_child(&parent, seg, mode, object_id);
                    self.known.insert(full.clone(), mode);
                    self.files += 1;
                }
            }
            parent = full;
        }
        Ok(())
    }

    fn insert_child(
        &mut self,
        parent: &str,
        name: &str,
        mode: EntryMode,
        object_id: Option<ObjectId>,
    ) {
        self.dirs
            .entry(parent.to_string())
            .or_default()
            .children
            .push(PendingEntry {
                name: name.to_string(),
                mode,
                object_id,
            });
    }

    /// Children registered directly under `dir`, in insertion order.
    pub fn children(&self, dir: &str) -> Option<&[PendingEntry]> {
        self.dirs.get(dir).map(|d| d.children.as_slice())
    }

    /// Number of directories, including the root.
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Number of non-directory entries.
    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Writes a [`PathIndexer`] skeleton into an object store, bottom-up.
///
/// Each directory's children are sorted canonically (directories compare as
/// if their name ended in `/`), subdirectories are encoded first and their
/// hashes patched in, then the directory itself is written. Hashes are
/// memoized per directory path and stay available through
/// [`TreeEncoder::tree_id`] after encoding.
///
/// A store failure aborts the build. Objects written before the failure stay
/// in the store; they are content-addressed and harmless.
pub struct TreeEncoder<'a, O: ?Sized + TreeObserver = NoopObserver> {
    store: &'a dyn ObjectStore,
    observer: &'a O,
    written: HashMap<String, ObjectId>,
}

impl<'a> TreeEncoder<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            observer: &NoopObserver,
            written: HashMap::new(),
        }
    }
}

impl<'a, O: ?Sized + TreeObserver> TreeEncoder<'a, O> {
    /// Encoder that reports each written tree to `observer`.
    pub fn with_observer(store: &'a dyn ObjectStore, observer: &'a O) -> Self {
        Self {
            store,
            observer,
            written: HashMap::new(),
        }
    }

    /// Encode the whole skeleton and return the root tree's ID.
    pub fn encode(&mut self, indexer: &PathIndexer) -> IndexResult<ObjectId> {
        self.written.clear();
        let root = self.encode_dir(indexer, ROOT)?;
        debug!(
            root = %root.short_hex(),
            trees = self.written.len(),
            files = indexer.file_count(),
            "tree encoded"
        );
        Ok(root)
    }

    /// ID of the tree written for directory `path` by the last `encode`.
    pub fn tree_id(&self, path: &str) -> Option<ObjectId> {
        self.written.get(path).copied()
    }

    fn encode_dir(&mut self, indexer: &PathIndexer, path: &str) -> IndexResult<ObjectId> {
        if let Some(id) = self.written.get(path) {
            return Ok(*id);
        }
        let children = indexer
            .children(path)
            .ok_or_else(|| IndexError::PathNotFound(path.to_string()))?;

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let object_id = match (child.mode, child.object_id) {
                (EntryMode::Directory, _) => {
                    self.encode_dir(indexer, &join_path(path, &child.name))?
                }
                (_, Some(id)) => id,
                (_, None) => return Err(IndexError::MissingContent(join_path(path, &child.name))),
            };
            entries.push(TreeEntry::new(child.mode, child.name.clone(), object_id));
        }

        let tree = Tree::new(entries);
        let id = self.store.write_tree(&tree)?;
        self.observer.tree_written(path, &id, tree.len());
        self.written.insert(path.to_string(), id);
        Ok(id)
    }
}

/// Encode `indexer` into `store` and return the root tree ID.
pub fn build_tree(store: &dyn ObjectStore, indexer: &PathIndexer) -> IndexResult<ObjectId> {
    TreeEncoder::new(store).encode(indexer)
}
