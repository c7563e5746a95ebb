//! Read-only filesystem over a persisted tree.

use std::sync::Arc;
use std::time::SystemTime;

use arbor_refs::{resolve_ref, RefStore};
use arbor_store::{EntryMode, ObjectStore, ObjectStoreExt, Tree, TreeEntry};
use arbor_types::ObjectId;

use crate::error::{VfsError, VfsResult};
use crate::fs::{Dir, File, FileInfo, FileSystem};
use crate::path::{self, join_path, normalize};

/// A filesystem rooted at one tree hash.
///
/// Nothing is loaded up front: each lookup walks tree objects from the root,
/// and file content is fetched only when read. Every mutation fails with
/// [`VfsError::PermissionDenied`] and the store is never written.
#[derive(Clone)]
pub struct ReadOnlyView {
    store: Arc<dyn ObjectStore>,
    root: ObjectId,
    commit: Option<ObjectId>,
}

impl std::fmt::Debug for ReadOnlyView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyView")
            .field("root", &self.root)
            .field("commit", &self.commit)
            .finish()
    }
}

impl ReadOnlyView {
    /// View of the tree `root`. The tree is not checked until first use.
    pub fn new(store: Arc<dyn ObjectStore>, root: ObjectId) -> Self {
        Self {
            store,
            root,
            commit: None,
        }
    }

    /// View of an empty tree, for unborn references.
    pub fn empty(store: Arc<dyn ObjectStore>) -> VfsResult<Self> {
        let root = store.write_tree(&Tree::empty())?;
        Ok(Self::new(store, root))
    }

    /// View of the tree recorded in commit `commit`.
    pub fn from_commit(store: Arc<dyn ObjectStore>, commit: ObjectId) -> VfsResult<Self> {
        let tree = store.read_commit(&commit)?.tree;
        Ok(Self {
            store,
            root: tree,
            commit: Some(commit),
        })
    }

    /// View of the commit `name` resolves to, following symbolic refs.
    pub fn from_ref(
        store: Arc<dyn ObjectStore>,
        refs: &dyn RefStore,
        name: &str,
    ) -> VfsResult<Self> {
        let commit = resolve_ref(refs, name)?;
        Self::from_commit(store, commit)
    }

    pub fn root_tree(&self) -> ObjectId {
        self.root
    }

    /// Commit this view was opened from, if any.
    pub fn commit(&self) -> Option<ObjectId> {
        self.commit
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Tree entry at `path`. The root is reported as a directory named `""`.
    pub fn lookup(&self, path: &str) -> VfsResult<TreeEntry> {
        self.resolve("lookup", &normalize("lookup", path)?)
    }

    /// Descend from the root to the normalized `path`.
    ///
    /// A missing segment, or a non-final segment that is not a directory,
    /// is `NotFound`.
    pub(crate) fn resolve(&self, op: &'static str, path: &str) -> VfsResult<TreeEntry> {
        let mut current = TreeEntry::new(EntryMode::Directory, "", self.root);
        if path.is_empty() {
            return Ok(current);
        }
        for seg in path.split('/') {
            if !current.mode.is_dir() {
                return Err(not_found(op, path));
            }
            let tree = self.store.read_tree(&current.object_id)?;
            current = tree.get(seg).cloned().ok_or_else(|| not_found(op, path))?;
        }
        Ok(current)
    }

    /// Entries of the directory at the normalized `path`, in stored order.
    pub(crate) fn tree_at(&self, op: &'static str, path: &str) -> VfsResult<Tree> {
        let entry = self.resolve(op, path)?;
        if !entry.mode.is_dir() {
            return Err(VfsError::NotADirectory {
                op,
                path: path::display(path),
            });
        }
        Ok(self.store.read_tree(&entry.object_id)?)
    }
}

pub(crate) fn not_found(op: &'static str, path: &str) -> VfsError {
    VfsError::NotFound {
        op,
        path: path::display(path),
    }
}

fn denied(op: &'static str, path: &str) -> VfsError {
    VfsError::PermissionDenied {
        op,
        path: path.to_string(),
    }
}

impl FileSystem for ReadOnlyView {
    fn metadata(&self, path: &str) -> VfsResult<FileInfo> {
        let path = normalize("stat", path)?;
        let entry = self.resolve("stat", &path)?;
        Ok(FileInfo::from_tree(path, entry.mode, entry.object_id))
    }

    fn open_file(&self, path: &str) -> VfsResult<File> {
        let path = normalize("open", path)?;
        let entry = self.resolve("open", &path)?;
        if entry.mode.is_dir() {
            return Err(VfsError::IsADirectory {
                op: "open",
                path: path::display(&path),
            });
        }
        let info = FileInfo::from_tree(path, entry.mode, entry.object_id);
        Ok(File::stored(info, Arc::clone(&self.store), entry.object_id))
    }

    fn open_dir(&self, path: &str) -> VfsResult<Dir> {
        let path = normalize("opendir", path)?;
        let tree = self.tree_at("opendir", &path)?;
        let entries = tree
            .entries
            .into_iter()
            .map(|e| FileInfo::from_tree(join_path(&path, &e.name), e.mode, e.object_id))
            .collect();
        Ok(Dir::new(path, entries))
    }

    fn create_dir(&mut self, path: &str) -> VfsResult<()> {
        Err(denied("mkdir", path))
    }

    fn create_dir_all(&mut self, path: &str) -> VfsResult<()> {
        Err(denied("mkdir", path))
    }

    fn create_file(&mut self, path: &str, _content: &[u8]) -> VfsResult<()> {
        Err(denied("create", path))
    }

    fn write_file(&mut self, path: &str, _content: &[u8]) -> VfsResult<()> {
        Err(denied("write", path))
    }

    fn remove(&mut self, path: &str) -> VfsResult<()> {
        Err(denied("remove", path))
    }

    fn remove_all(&mut self, path: &str) -> VfsResult<()> {
        Err(denied("remove", path))
    }

    fn rename(&mut self, from: &str, _to: &str) -> VfsResult<()> {
        Err(denied("rename", from))
    }

    fn set_mode(&mut self, path: &str, _mode: EntryMode) -> VfsResult<()> {
        Err(denied("chmod", path))
    }

    fn set_modified(&mut self, path: &str, _modified: SystemTime) -> VfsResult<()> {
        Err(denied("chtimes", path))
    }
}
