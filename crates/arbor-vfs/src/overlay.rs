//! Writable filesystem layered over a read-only tree.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use arbor_index::{IndexStore, NoopObserver, PathIndexer, StagingIndex, TreeEncoder};
use arbor_refs::{peel_ref, RefStore};
use arbor_store::{
    canonical_name_cmp, EntryMode, ObjectStore, ObjectStoreExt, StoreError, TreeEntry,
};
use arbor_types::{ObjectId, Signature};
use tracing::debug;

use crate::commit::{CommitBuilder, CommitOutcome};
use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};
use crate::fs::{Dir, File, FileInfo, FileSystem};
use crate::observer::Observer;
use crate::path::{self, ancestors, is_within, join_path, normalize, split_parent};
use crate::scratch::{Content, Node, ScratchSpace};
use crate::view::{not_found, ReadOnlyView};

/// Something that exists in the union of scratch space and base.
enum Found<'a> {
    Scratch(&'a Node),
    Base(TreeEntry),
}

impl Found<'_> {
    fn is_dir(&self) -> bool {
        match self {
            Found::Scratch(node) => matches!(node, Node::Dir { .. }),
            Found::Base(entry) => entry.mode.is_dir(),
        }
    }

    fn info(&self, path: &str) -> FileInfo {
        match self {
            Found::Scratch(Node::File {
                content,
                mode,
                modified,
            }) => {
                let id = match content {
                    Content::Stored { id, .. } => Some(*id),
                    Content::Inline(_) => None,
                };
                FileInfo::buffered(path.to_string(), *mode, id, content.size(), *modified)
            }
            Found::Scratch(Node::Dir { modified, .. }) => {
                FileInfo::buffered(path.to_string(), EntryMode::Directory, None, None, *modified)
            }
            Found::Scratch(Node::Whiteout) => {
                FileInfo::buffered(path.to_string(), EntryMode::Regular, None, None, None)
            }
            Found::Base(entry) => {
                FileInfo::from_tree(path.to_string(), entry.mode, entry.object_id)
            }
        }
    }
}

/// A file of the flattened union.
struct FlatFile {
    path: String,
    mode: EntryMode,
    object_id: ObjectId,
    size: Option<u64>,
}

#[derive(Default)]
struct Flattened {
    files: Vec<FlatFile>,
    empty_dirs: Vec<String>,
}

/// What [`CopyOnWriteOverlay::stage`] wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageSummary {
    pub files: usize,
    /// Root tree of the staged index.
    pub tree: ObjectId,
}

/// Copy-on-write filesystem over a [`ReadOnlyView`].
///
/// Reads check the scratch space first and fall through to the base tree.
/// Every mutation lands in the scratch space; the base and the object store
/// are untouched until [`CopyOnWriteOverlay::commit`] or
/// [`CopyOnWriteOverlay::stage`]. Removing a base entry records a whiteout,
/// and a directory re-created over a whiteout is opaque, hiding the old
/// base children.
///
/// For base directories `FileInfo::object_id` is the base tree, which does
/// not reflect buffered changes beneath them.
pub struct CopyOnWriteOverlay {
    base: ReadOnlyView,
    scratch: ScratchSpace,
    refs: Arc<dyn RefStore>,
    reference: String,
    base_commit: Option<ObjectId>,
    max_retries: u32,
    require_fresh_base: bool,
    observer: Arc<dyn Observer>,
}

impl std::fmt::Debug for CopyOnWriteOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyOnWriteOverlay")
            .field("base", &self.base)
            .field("reference", &self.reference)
            .field("base_commit", &self.base_commit)
            .field("pending", &self.scratch.len())
            .finish()
    }
}

impl CopyOnWriteOverlay {
    /// Overlay on `base` whose commits advance `reference`.
    ///
    /// The base commit, used for parent pinning when `require_fresh_base`
    /// is set, is the commit `base` was opened from.
    pub fn new(base: ReadOnlyView, refs: Arc<dyn RefStore>, reference: impl Into<String>) -> Self {
        let defaults = VfsConfig::default();
        Self {
            base_commit: base.commit(),
            base,
            scratch: ScratchSpace::new(),
            refs,
            reference: reference.into(),
            max_retries: defaults.max_ref_update_retries,
            require_fresh_base: defaults.require_fresh_base,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Overlay on the current target of `config.reference`, or on an empty
    /// tree if that reference is unborn.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        config: &VfsConfig,
    ) -> VfsResult<Self> {
        let head = peel_ref(refs.as_ref(), &config.reference)?;
        let base = match head.target {
            Some(commit) => ReadOnlyView::from_commit(store, commit)?,
            None => ReadOnlyView::empty(store)?,
        };
        Ok(Self::new(base, refs, config.reference.clone()).with_config(config))
    }

    /// Take the retry and freshness policy from `config`.
    pub fn with_config(mut self, config: &VfsConfig) -> Self {
        self.max_retries = config.max_ref_update_retries;
        self.require_fresh_base = config.require_fresh_base;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn base(&self) -> &ReadOnlyView {
        &self.base
    }

    pub fn base_commit(&self) -> Option<ObjectId> {
        self.base_commit
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Whether any write is buffered.
    pub fn is_dirty(&self) -> bool {
        !self.scratch.is_empty()
    }

    /// Drop every buffered write. Returns how many paths were touched.
    pub fn discard(&mut self) -> usize {
        let n = self.scratch.clear();
        self.observer.overlay_reset(n);
        n
    }

    fn store(&self) -> &Arc<dyn ObjectStore> {
        self.base.store()
    }

    // ---------------------------------------------------------------
    // Union lookups
    // ---------------------------------------------------------------

    fn find(&self, op: &'static str, path: &str) -> VfsResult<Option<Found<'_>>> {
        if path.is_empty() {
            return Ok(Some(Found::Base(TreeEntry::new(
                EntryMode::Directory,
                "",
                self.base.root_tree(),
            ))));
        }
        if self.scratch.blocked(path) {
            return Ok(None);
        }
        match self.scratch.get(path) {
            Some(Node::Whiteout) => return Ok(None),
            Some(node) => return Ok(Some(Found::Scratch(node))),
            None => {}
        }
        if self.scratch.hides_base_above(path) {
            return Ok(None);
        }
        self.base_entry(op, path).map(|e| e.map(Found::Base))
    }

    fn base_entry(&self, op: &'static str, path: &str) -> VfsResult<Option<TreeEntry>> {
        match self.base.resolve(op, path) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn require(&self, op: &'static str, path: &str) -> VfsResult<Found<'_>> {
        self.find(op, path)?.ok_or_else(|| not_found(op, path))
    }

    /// Union listing of directory `dir` in canonical order.
    fn list(&self, op: &'static str, dir: &str) -> VfsResult<Vec<FileInfo>> {
        let mut out = Vec::new();
        if self.scratch.base_children_visible(dir) {
            if let Some(entry) = self.base_entry(op, dir)?.filter(|e| e.mode.is_dir()) {
                for child in self.store().read_tree(&entry.object_id)?.entries {
                    let child_path = join_path(dir, &child.name);
                    if self.scratch.get(&child_path).is_none() {
                        out.push(FileInfo::from_tree(child_path, child.mode, child.object_id));
                    }
                }
            }
        }
        for (name, node) in self.scratch.children(dir) {
            if !matches!(node, Node::Whiteout) {
                out.push(Found::Scratch(node).info(&join_path(dir, name)));
            }
        }
        out.sort_by(|a, b| canonical_name_cmp(a.name(), a.is_dir(), b.name(), b.is_dir()));
        Ok(out)
    }

    fn require_parent_dir(&self, op: &'static str, path: &str) -> VfsResult<()> {
        let (parent, _) = split_parent(path);
        match self.find(op, parent)? {
            Some(found) if found.is_dir() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory {
                op,
                path: path.to_string(),
            }),
            None => Err(not_found(op, path)),
        }
    }

    // ---------------------------------------------------------------
    // Mutation helpers
    // ---------------------------------------------------------------

    /// Delete `path` from the union: drop buffered nodes at and below it and
    /// whiteout the base entry if one would show through.
    fn erase(&mut self, op: &'static str, path: &str) -> VfsResult<()> {
        let base_present =
            !self.scratch.hides_base_above(path) && self.base_entry(op, path)?.is_some();
        self.scratch.remove_subtree(path);
        if base_present {
            self.scratch.insert(path.to_string(), Node::Whiteout);
        }
        Ok(())
    }

    fn insert_dir(&mut self, path: &str) {
        let opaque = matches!(self.scratch.get(path), Some(Node::Whiteout));
        self.scratch.insert(
            path.to_string(),
            Node::Dir {
                opaque,
                modified: Some(SystemTime::now()),
            },
        );
    }

    fn put_file(
        &mut self,
        op: &'static str,
        path: &str,
        content: &[u8],
        exclusive: bool,
    ) -> VfsResult<()> {
        if path.is_empty() {
            return Err(VfsError::IsADirectory {
                op,
                path: path::display(path),
            });
        }
        self.require_parent_dir(op, path)?;
        let mode = match self.find(op, path)? {
            Some(_) if exclusive => {
                return Err(VfsError::AlreadyExists {
                    op,
                    path: path.to_string(),
                })
            }
            Some(found) if found.is_dir() => {
                return Err(VfsError::IsADirectory {
                    op,
                    path: path.to_string(),
                })
            }
            Some(found) => found.info(path).mode(),
            None => EntryMode::Regular,
        };
        self.scratch.insert(
            path.to_string(),
            Node::File {
                content: Content::Inline(content.into()),
                mode,
                modified: Some(SystemTime::now()),
            },
        );
        debug!(path, size = content.len(), "buffered write");
        Ok(())
    }

    /// A base file as a scratch node that refers to its stored blob.
    fn copy_up(&self, entry: &TreeEntry, modified: Option<SystemTime>) -> VfsResult<Node> {
        Ok(Node::File {
            content: Content::Stored {
                id: entry.object_id,
                size: self.store().object_size(&entry.object_id)?,
            },
            mode: entry.mode,
            modified,
        })
    }

    /// Every node needed to recreate the union subtree at `path` elsewhere,
    /// keyed relative to `path` (`""` for `path` itself).
    fn snapshot(&self, op: &'static str, path: &str) -> VfsResult<Vec<(String, Node)>> {
        let mut out = Vec::new();
        self.snapshot_into(op, path, String::new(), &mut out)?;
        Ok(out)
    }

    fn snapshot_into(
        &self,
        op: &'static str,
        path: &str,
        rel: String,
        out: &mut Vec<(String, Node)>,
    ) -> VfsResult<()> {
        let (node, is_dir) = match self.require(op, path)? {
            Found::Scratch(Node::Dir { modified, .. }) => (
                Node::Dir {
                    opaque: true,
                    modified: *modified,
                },
                true,
            ),
            Found::Scratch(node) => (node.clone(), false),
            Found::Base(entry) if entry.mode.is_dir() => (
                Node::Dir {
                    opaque: true,
                    modified: None,
                },
                true,
            ),
            Found::Base(entry) => (self.copy_up(&entry, None)?, false),
        };
        out.push((rel.clone(), node));
        if is_dir {
            for child in self.list(op, path)? {
                let child_rel = join_path(&rel, child.name());
                self.snapshot_into(op, child.path(), child_rel, out)?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Stage and commit
    // ---------------------------------------------------------------

    /// Walk the union, storing buffered content as blobs.
    fn flatten(&self, op: &'static str) -> VfsResult<Flattened> {
        let mut flat = Flattened::default();
        self.flatten_dir(op, "", &mut flat)?;
        Ok(flat)
    }

    fn flatten_dir(&self, op: &'static str, dir: &str, flat: &mut Flattened) -> VfsResult<()> {
        let children = self.list(op, dir)?;
        if children.is_empty() && !dir.is_empty() {
            flat.empty_dirs.push(dir.to_string());
        }
        for info in children {
            if info.is_dir() {
                self.flatten_dir(op, info.path(), flat)?;
                continue;
            }
            let (object_id, size) = match self.scratch.get(info.path()) {
                Some(Node::File {
                    content: Content::Inline(data),
                    ..
                }) => (self.store().write_blob(data)?, Some(data.len() as u64)),
                Some(Node::File {
                    content: Content::Stored { id, size },
                    ..
                }) => (*id, *size),
                _ => (
                    info.object_id().ok_or_else(|| not_found(op, info.path()))?,
                    None,
                ),
            };
            flat.files.push(FlatFile {
                path: info.path().to_string(),
                mode: info.mode(),
                object_id,
                size,
            });
        }
        Ok(())
    }

    /// Encode the flattened union, empty directories included.
    fn encode(&self, flat: &Flattened) -> VfsResult<ObjectId> {
        let mut indexer = PathIndexer::new();
        for file in &flat.files {
            indexer.add_file(&file.path, file.mode, file.object_id)?;
        }
        for dir in &flat.empty_dirs {
            indexer.add_dir(dir)?;
        }
        let store = self.store().as_ref();
        Ok(TreeEncoder::with_observer(store, self.observer.as_ref()).encode(&indexer)?)
    }

    /// Write the union into `index`, save it, and reset the overlay.
    ///
    /// The index ends up mirroring the union exactly: entries are added or
    /// updated, and entries for paths no longer present are dropped. The
    /// overlay then continues on the union's tree, so staged content stays
    /// visible. No commit is made and the reference does not move.
    ///
    /// The index has no notion of directories, so empty directories are not
    /// staged. They remain in the overlay's base and survive the next commit.
    ///
    /// `index` must be backed by the same object store as this overlay.
    pub fn stage(
        &mut self,
        index: &mut StagingIndex,
        index_store: &dyn IndexStore,
    ) -> VfsResult<StageSummary> {
        let flat = self.flatten("stage")?;
        let mut present = HashSet::with_capacity(flat.files.len());
        for file in &flat.files {
            let size = match file.size {
                Some(size) => size,
                None => self
                    .store()
                    .object_size(&file.object_id)?
                    .ok_or(StoreError::NotFound(file.object_id))?,
            };
            index.stage_object(&file.path, file.object_id, file.mode, size)?;
            present.insert(file.path.clone());
        }
        index.retain(|e| present.contains(&e.path));
        let tree = index.write_tree_observed(self.observer.as_ref())?;
        index.save(index_store)?;

        let base_tree = if flat.empty_dirs.is_empty() {
            tree
        } else {
            self.encode(&flat)?
        };
        self.base = ReadOnlyView::new(Arc::clone(self.store()), base_tree);
        self.observer.staged(present.len(), &tree);
        self.discard();
        Ok(StageSummary {
            files: present.len(),
            tree,
        })
    }

    /// Build a tree from the union, commit it on top of the reference's
    /// current target, and advance the reference.
    ///
    /// On success the overlay is reset and re-based on the new commit. On
    /// failure neither the reference nor the buffered writes change, so the
    /// call can be retried. See [`CommitBuilder`] for the retry policy.
    pub fn commit(&mut self, message: &str, author: &Signature) -> VfsResult<CommitOutcome> {
        let flat = self.flatten("commit")?;
        let tree = self.encode(&flat)?;

        let store = Arc::clone(self.store());
        let reference = self.reference.clone();
        let mut builder = CommitBuilder::new(store.as_ref(), self.refs.as_ref(), reference)
            .max_retries(self.max_retries);
        if self.require_fresh_base {
            builder = builder.require_parent(self.base_commit);
        }
        let outcome = builder.commit(tree, message, author, self.observer.as_ref())?;

        self.base = ReadOnlyView::from_commit(store, outcome.commit)?;
        self.base_commit = Some(outcome.commit);
        self.discard();
        Ok(outcome)
    }
}

impl FileSystem for CopyOnWriteOverlay {
    fn metadata(&self, path: &str) -> VfsResult<FileInfo> {
        let path = normalize("stat", path)?;
        Ok(self.require("stat", &path)?.info(&path))
    }

    fn open_file(&self, path: &str) -> VfsResult<File> {
        let path = normalize("open", path)?;
        let found = self.require("open", &path)?;
        if found.is_dir() {
            return Err(VfsError::IsADirectory {
                op: "open",
                path: path::display(&path),
            });
        }
        let info = found.info(&path);
        Ok(match found {
            Found::Scratch(Node::File {
                content: Content::Inline(data),
                ..
            }) => File::buffered(info, Arc::clone(data)),
            Found::Scratch(Node::File {
                content: Content::Stored { id, .. },
                ..
            }) => File::stored(info, Arc::clone(self.store()), *id),
            Found::Base(entry) => File::stored(info, Arc::clone(self.store()), entry.object_id),
            Found::Scratch(_) => return Err(not_found("open", &path)),
        })
    }

    fn open_dir(&self, path: &str) -> VfsResult<Dir> {
        let path = normalize("opendir", path)?;
        if !self.require("opendir", &path)?.is_dir() {
            return Err(VfsError::NotADirectory {
                op: "opendir",
                path: path::display(&path),
            });
        }
        let entries = self.list("opendir", &path)?;
        Ok(Dir::new(path, entries))
    }

    fn create_dir(&mut self, path: &str) -> VfsResult<()> {
        let path = normalize("mkdir", path)?;
        if path.is_empty() || self.find("mkdir", &path)?.is_some() {
            return Err(VfsError::AlreadyExists {
                op: "mkdir",
                path: path::display(&path),
            });
        }
        self.require_parent_dir("mkdir", &path)?;
        self.insert_dir(&path);
        Ok(())
    }

    fn create_dir_all(&mut self, path: &str) -> VfsResult<()> {
        let path = normalize("mkdir", path)?;
        if path.is_empty() {
            return Ok(());
        }
        let prefixes: Vec<String> = ancestors(&path)
            .chain(std::iter::once(path.as_str()))
            .map(str::to_string)
            .collect();
        for prefix in prefixes {
            let is_dir = self.find("mkdir", &prefix)?.map(|found| found.is_dir());
            match is_dir {
                Some(true) => {}
                Some(false) => {
                    return Err(VfsError::NotADirectory {
                        op: "mkdir",
                        path: prefix,
                    })
                }
                None => self.insert_dir(&prefix),
            }
        }
        Ok(())
    }

    fn create_file(&mut self, path: &str, content: &[u8]) -> VfsResult<()> {
        let path = normalize("create", path)?;
        self.put_file("create", &path, content, true)
    }

    fn write_file(&mut self, path: &str, content: &[u8]) -> VfsResult<()> {
        let path = normalize("write", path)?;
        self.put_file("write", &path, content, false)
    }

    fn remove(&mut self, path: &str) -> VfsResult<()> {
        let path = normalize("remove", path)?;
        if path.is_empty() {
            return Err(VfsError::InvalidPath {
                op: "remove",
                path: "/".into(),
                reason: "cannot remove the root".into(),
            });
        }
        if self.require("remove", &path)?.is_dir() && !self.list("remove", &path)?.is_empty() {
            return Err(VfsError::DirectoryNotEmpty { op: "remove", path });
        }
        self.erase("remove", &path)
    }

    fn remove_all(&mut self, path: &str) -> VfsResult<()> {
        let path = normalize("remove", path)?;
        if path.is_empty() {
            return Err(VfsError::InvalidPath {
                op: "remove",
                path: "/".into(),
                reason: "cannot remove the root".into(),
            });
        }
        if self.find("remove", &path)?.is_none() {
            return Ok(());
        }
        self.erase("remove", &path)
    }

    fn rename(&mut self, from: &str, to: &str) -> VfsResult<()> {
        let from = normalize("rename", from)?;
        let to = normalize("rename", to)?;
        if from.is_empty() || to.is_empty() {
            return Err(VfsError::InvalidPath {
                op: "rename",
                path: "/".into(),
                reason: "cannot rename the root".into(),
            });
        }
        let src_is_dir = self.require("rename", &from)?.is_dir();
        if from == to {
            return Ok(());
        }
        if is_within(&to, &from) {
            return Err(VfsError::InvalidPath {
                op: "rename",
                path: to,
                reason: format!("cannot move {from} into itself"),
            });
        }
        self.require_parent_dir("rename", &to)?;
        if let Some(dst) = self.find("rename", &to)? {
            match (src_is_dir, dst.is_dir()) {
                (false, true) => return Err(VfsError::IsADirectory { op: "rename", path: to }),
                (true, false) => return Err(VfsError::NotADirectory { op: "rename", path: to }),
                (true, true) if !self.list("rename", &to)?.is_empty() => {
                    return Err(VfsError::DirectoryNotEmpty { op: "rename", path: to })
                }
                _ => {}
            }
        }

        let moved = self.snapshot("rename", &from)?;
        self.scratch.remove_subtree(&to);
        self.erase("rename", &from)?;
        for (rel, node) in moved {
            let dest = if rel.is_empty() { to.clone() } else { join_path(&to, &rel) };
            self.scratch.insert(dest, node);
        }
        debug!(from = %from, to = %to, "buffered rename");
        Ok(())
    }

    fn set_mode(&mut self, path: &str, mode: EntryMode) -> VfsResult<()> {
        let path = normalize("chmod", path)?;
        let found = self.require("chmod", &path)?;
        if found.is_dir() {
            return Err(VfsError::IsADirectory {
                op: "chmod",
                path: path::display(&path),
            });
        }
        if mode.is_dir() {
            return Err(VfsError::InvalidMode {
                op: "chmod",
                path,
                mode,
            });
        }
        let node = match found {
            Found::Base(entry) => Some(self.copy_up(&entry, None)?),
            Found::Scratch(_) => None,
        };
        if let Some(node) = node {
            self.scratch.insert(path.clone(), node);
        }
        if let Some(Node::File { mode: current, .. }) = self.scratch.get_mut(&path) {
            *current = mode;
        }
        Ok(())
    }

    fn set_modified(&mut self, path: &str, modified: SystemTime) -> VfsResult<()> {
        let path = normalize("chtimes", path)?;
        if path.is_empty() {
            return Err(VfsError::InvalidPath {
                op: "chtimes",
                path: "/".into(),
                reason: "the root has no stored metadata".into(),
            });
        }
        let node = match self.require("chtimes", &path)? {
            Found::Base(entry) if entry.mode.is_dir() => Some(Node::Dir {
                opaque: false,
                modified: Some(modified),
            }),
            Found::Base(entry) => Some(self.copy_up(&entry, Some(modified))?),
            Found::Scratch(_) => None,
        };
        match node {
            Some(node) => self.scratch.insert(path, node),
            None => {
                if let Some(Node::File { modified: m, .. } | Node::Dir { modified: m, .. }) =
                    self.scratch.get_mut(&path)
                {
                    *m = Some(modified);
                }
            }
        }
        Ok(())
    }
}
