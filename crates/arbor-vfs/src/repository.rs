use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbor_index::{
    import_directory, FileIndexStore, ImportSummary, InMemoryIndexStore, IndexStore, NoopObserver,
    StagingIndex,
};
use arbor_refs::{
    branch_ref_name, peel_ref, resolve_ref, FileRefStore, InMemoryRefStore, Ref, RefError, RefStore,
    HEAD,
};
use arbor_store::{DiskObjectStore, InMemoryObjectStore, ObjectKind, ObjectStore};
use arbor_types::{ObjectId, Signature};
use tracing::info;

use crate::commit::{CommitBuilder, CommitOutcome};
use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};
use crate::observer::Observer;
use crate::overlay::CopyOnWriteOverlay;
use crate::view::ReadOnlyView;

pub const CONFIG_FILE: &str = "config.toml";
pub const OBJECTS_DIR: &str = "objects";
pub const INDEX_FILE: &str = "index";

/// An object store, a reference store and a staging index wired together.
///
/// On disk a repository directory holds `config.toml`, `objects/`, `HEAD`,
/// `refs/` and `index`.
pub struct Repository {
    path: Option<PathBuf>,
    store: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    index_store: Arc<dyn IndexStore>,
    config: VfsConfig,
    observer: Arc<dyn Observer>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("reference", &self.config.reference)
            .finish()
    }
}

impl Repository {
    /// Create a repository at `path`, with `HEAD` pointing at the (unborn)
    /// default branch.
    ///
    /// An existing `config.toml` in `path` is honored; otherwise the defaults
    /// are written out.
    pub fn init(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        if path.join(HEAD).exists() {
            return Err(VfsError::AlreadyExists {
                op: "init",
                path: path.display().to_string(),
            });
        }
        fs::create_dir_all(path)?;
        let config_path = path.join(CONFIG_FILE);
        let config = VfsConfig::load(&config_path)?;
        if !config_path.exists() {
            fs::write(&config_path, config.to_toml_string()?)?;
        }

        let repo = Self::from_parts(path, config)?;
        repo.refs
            .write_ref(HEAD, &Ref::Symbolic(branch_ref_name(&repo.config.default_branch)?))?;
        info!(
            path = %path.display(),
            branch = %repo.config.default_branch,
            "repository initialized"
        );
        Ok(repo)
    }

    /// Open an existing repository at `path`.
    pub fn open(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        if !path.join(HEAD).exists() {
            return Err(VfsError::NotFound {
                op: "open",
                path: path.display().to_string(),
            });
        }
        let config = VfsConfig::load(&path.join(CONFIG_FILE))?;
        Self::from_parts(path, config)
    }

    /// A repository that lives only in memory.
    pub fn in_memory() -> VfsResult<Self> {
        Self::in_memory_with_config(VfsConfig::default())
    }

    pub fn in_memory_with_config(config: VfsConfig) -> VfsResult<Self> {
        let refs = InMemoryRefStore::new();
        refs.write_ref(HEAD, &Ref::Symbolic(branch_ref_name(&config.default_branch)?))?;
        Ok(Self {
            path: None,
            store: Arc::new(InMemoryObjectStore::new()),
            refs: Arc::new(refs),
            index_store: Arc::new(InMemoryIndexStore::new()),
            config,
            observer: Arc::new(NoopObserver),
        })
    }

    fn from_parts(path: &Path, config: VfsConfig) -> VfsResult<Self> {
        let store = DiskObjectStore::open(path.join(OBJECTS_DIR))?
            .with_compression_level(config.compression_level);
        Ok(Self {
            path: Some(path.to_path_buf()),
            store: Arc::new(store),
            refs: Arc::new(FileRefStore::open(path)?),
            index_store: Arc::new(FileIndexStore::new(path.join(INDEX_FILE))),
            config,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Repository directory; `None` for in-memory repositories.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }

    /// Signature from the configured author, stamped now.
    pub fn signature(&self) -> Signature {
        Signature::now(self.config.author.name.clone(), self.config.author.email.clone())
    }

    // ---- References ----

    /// Commit the configured reference points at, or `None` while unborn.
    pub fn head(&self) -> VfsResult<Option<ObjectId>> {
        Ok(peel_ref(self.refs.as_ref(), &self.config.reference)?.target)
    }

    /// Follow `name` through symbolic references to an object ID.
    pub fn resolve(&self, name: &str) -> VfsResult<ObjectId> {
        Ok(resolve_ref(self.refs.as_ref(), name)?)
    }

    pub fn list_refs(&self, prefix: &str) -> VfsResult<Vec<(String, Ref)>> {
        Ok(self.refs.list_refs(prefix)?)
    }

    // ---- Views ----

    /// Read-only view of the configured reference; empty while unborn.
    pub fn view(&self) -> VfsResult<ReadOnlyView> {
        match self.head()? {
            Some(commit) => ReadOnlyView::from_commit(Arc::clone(&self.store), commit),
            None => ReadOnlyView::empty(Arc::clone(&self.store)),
        }
    }

    /// Read-only view of `rev`: a full reference name, a branch name, or a
    /// commit or tree hash.
    pub fn view_at(&self, rev: &str) -> VfsResult<ReadOnlyView> {
        if let Ok(id) = rev.parse::<ObjectId>() {
            if let Some(object) = self.store.read(&id)? {
                return match object.kind {
                    ObjectKind::Commit => ReadOnlyView::from_commit(Arc::clone(&self.store), id),
                    ObjectKind::Tree => Ok(ReadOnlyView::new(Arc::clone(&self.store), id)),
                    ObjectKind::Blob => Err(VfsError::NotADirectory {
                        op: "view",
                        path: rev.to_string(),
                    }),
                };
            }
        }
        let commit = match resolve_ref(self.refs.as_ref(), rev) {
            Err(RefError::NotFound { .. } | RefError::InvalidName { .. }) => {
                resolve_ref(self.refs.as_ref(), &branch_ref_name(rev)?)?
            }
            other => other?,
        };
        ReadOnlyView::from_commit(Arc::clone(&self.store), commit)
    }

    /// Writable overlay on the configured reference.
    pub fn overlay(&self) -> VfsResult<CopyOnWriteOverlay> {
        Ok(
            CopyOnWriteOverlay::open(Arc::clone(&self.store), Arc::clone(&self.refs), &self.config)?
                .with_observer(Arc::clone(&self.observer)),
        )
    }

    // ---- Index ----

    pub fn index_store(&self) -> &dyn IndexStore {
        self.index_store.as_ref()
    }

    /// The saved staging index, or an empty one.
    pub fn load_index(&self) -> VfsResult<StagingIndex> {
        Ok(StagingIndex::load(Arc::clone(&self.store), self.index_store.as_ref())?)
    }

    pub fn save_index(&self, index: &StagingIndex) -> VfsResult<()> {
        Ok(index.save(self.index_store.as_ref())?)
    }

    /// Make the saved index mirror the directory `root`, using the
    /// configured import options.
    pub fn import(&self, root: &Path) -> VfsResult<ImportSummary> {
        let mut index = self.load_index()?;
        let summary = import_directory(&mut index, root, &self.config.import)?;
        self.save_index(&index)?;
        Ok(summary)
    }

    /// Commit the tree of `index` onto the configured reference.
    pub fn commit_index(
        &self,
        index: &mut StagingIndex,
        message: &str,
        author: &Signature,
    ) -> VfsResult<CommitOutcome> {
        let tree = index.write_tree_observed(self.observer.as_ref())?;
        CommitBuilder::from_config(self.store.as_ref(), self.refs.as_ref(), &self.config)
            .commit(tree, message, author, self.observer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use arbor_store::{EntryMode, ObjectStoreExt};

    use super::*;
    use crate::fs::FileSystem;

    #[test]
    fn init_creates_layout_and_unborn_head() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        let repo = Repository::init(&root).unwrap();

        assert!(root.join(CONFIG_FILE).is_file());
        assert!(root.join(OBJECTS_DIR).is_dir());
        assert_eq!(fs::read_to_string(root.join("HEAD")).unwrap(), "ref: refs/heads/main\n");
        assert_eq!(repo.head().unwrap(), None);
        assert!(matches!(
            Repository::init(&root),
            Err(VfsError::AlreadyExists { op: "init", .. })
        ));
    }

    #[test]
    fn init_honors_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "default_branch = \"trunk\"\n").unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert_eq!(
            repo.refs().read_ref(HEAD).unwrap(),
            Some(Ref::Symbolic("refs/heads/trunk".into()))
        );
    }

    #[test]
    fn objects_use_configured_compression() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "compression_level = 19\n").unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let data = "fn main() { println!(\"hi\"); }\n".repeat(64);
        let id = repo.store().write_blob(data.as_bytes()).unwrap();

        let hex = id.to_hex();
        let raw = fs::read(dir.path().join(OBJECTS_DIR).join(&hex[..2]).join(&hex[2..])).unwrap();
        let expected = zstd::encode_all(data.as_bytes(), 19).unwrap();
        assert_eq!(&raw[9..], expected.as_slice());
    }

    #[test]
    fn open_requires_initialized_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(VfsError::NotFound { op: "open", .. })
        ));
    }

    #[test]
    fn commits_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut overlay = repo.overlay().unwrap();
        overlay.create_dir_all("docs").unwrap();
        overlay.write_file("docs/guide.md", b"# Guide").unwrap();
        let outcome = overlay.commit("add guide", &repo.signature()).unwrap();
        drop(repo);

        let reopened = Repository::open(dir.path()).unwrap();
        assert_eq!(reopened.head().unwrap(), Some(outcome.commit));
        assert_eq!(reopened.resolve("HEAD").unwrap(), outcome.commit);
        let view = reopened.view().unwrap();
        assert_eq!(view.read("docs/guide.md").unwrap(), b"# Guide");
    }

    #[test]
    fn view_at_accepts_branches_refs_and_hashes() {
        let repo = Repository::in_memory().unwrap();
        let mut overlay = repo.overlay().unwrap();
        overlay.write_file("a", b"1").unwrap();
        let outcome = overlay.commit("one", &repo.signature()).unwrap();

        for rev in ["main", "refs/heads/main", "HEAD"] {
            assert_eq!(repo.view_at(rev).unwrap().root_tree(), outcome.tree, "{rev}");
        }
        assert_eq!(
            repo.view_at(&outcome.commit.to_hex()).unwrap().commit(),
            Some(outcome.commit)
        );
        assert_eq!(repo.view_at(&outcome.tree.to_hex()).unwrap().root_tree(), outcome.tree);
        assert!(repo.view_at("nope").is_err());
    }

    #[test]
    fn unborn_view_is_empty() {
        let repo = Repository::in_memory().unwrap();
        assert_eq!(repo.view().unwrap().open_dir("").unwrap().remaining(), 0);
    }

    #[test]
    fn import_and_commit_index() {
        let work = tempfile::tempdir().unwrap();
        fs::create_dir_all(work.path().join("src")).unwrap();
        fs::write(work.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(work.path().join("Cargo.toml"), "[package]").unwrap();

        let repo_dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(repo_dir.path()).unwrap();
        let summary = repo.import(work.path()).unwrap();
        assert_eq!(summary.files, 2);

        let mut index = repo.load_index().unwrap();
        assert_eq!(index.len(), 2);
        let outcome = repo
            .commit_index(&mut index, "import", &repo.signature())
            .unwrap();
        assert_eq!(outcome.parent, None);

        let view = repo.view().unwrap();
        assert_eq!(view.read("src/main.rs").unwrap(), b"fn main() {}");
        assert_eq!(view.metadata("Cargo.toml").unwrap().mode(), EntryMode::Regular);
    }
}
