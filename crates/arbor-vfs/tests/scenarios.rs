//! End-to-end scenarios through the public API.

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_index::{build_tree, InMemoryIndexStore, PathIndexer, StagingIndex};
use arbor_refs::{InMemoryRefStore, Ref, RefStore};
use arbor_store::{EntryMode, InMemoryObjectStore, ObjectStoreExt};
use arbor_types::Signature;
use arbor_vfs::{CopyOnWriteOverlay, FileSystem, ReadOnlyView, Repository, VfsConfig, VfsError};
use proptest::prelude::*;

fn sig() -> Signature {
    Signature::new("Ada", "ada@example.org", 1_700_000_000_000)
}

fn setup() -> (Arc<InMemoryObjectStore>, Arc<InMemoryRefStore>) {
    let store = Arc::new(InMemoryObjectStore::new());
    let refs = Arc::new(InMemoryRefStore::new());
    refs.write_ref("HEAD", &Ref::Symbolic("refs/heads/main".into())).unwrap();
    (store, refs)
}

fn overlay(store: &Arc<InMemoryObjectStore>, refs: &Arc<InMemoryRefStore>) -> CopyOnWriteOverlay {
    CopyOnWriteOverlay::open(store.clone(), refs.clone(), &VfsConfig::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

fn file_set() -> impl Strategy<Value = BTreeMap<String, (Vec<u8>, bool)>> {
    let segment = "[a-c]{1,2}";
    let path = prop::collection::vec(segment, 1..4).prop_map(|parts| parts.join("/"));
    let file = (prop::collection::vec(any::<u8>(), 0..16), any::<bool>());
    prop::collection::btree_map(path, file, 1..12)
        .prop_map(|mut files| {
            // A path that is also a directory of another path stays a directory.
            let dirs: Vec<String> = files
                .keys()
                .filter(|p| files.keys().any(|q| q.starts_with(&format!("{p}/"))))
                .cloned()
                .collect();
            for dir in dirs {
                files.remove(&dir);
            }
            files
        })
}

proptest! {
    #[test]
    fn root_hash_ignores_insertion_order(files in file_set(), seed in any::<u64>()) {
        let store = InMemoryObjectStore::new();
        let mut entries = Vec::new();
        for (path, (content, exec)) in &files {
            let mode = if *exec { EntryMode::Executable } else { EntryMode::Regular };
            entries.push((path.clone(), mode, store.write_blob(content).unwrap()));
        }

        let mut forward = PathIndexer::new();
        for (path, mode, id) in &entries {
            forward.add_file(path, *mode, *id).unwrap();
        }
        let mut shuffled = entries.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        let mut backward = PathIndexer::new();
        for (path, mode, id) in &shuffled {
            backward.add_file(path, *mode, *id).unwrap();
        }

        prop_assert_eq!(
            build_tree(&store, &forward).unwrap(),
            build_tree(&store, &backward).unwrap()
        );
    }
}

#[test]
fn file_and_directory_sharing_a_prefix_sort_canonically() {
    let store = InMemoryObjectStore::new();
    let blob = store.write_blob(b"x").unwrap();
    let mut idx = PathIndexer::new();
    idx.add_file("foo/bar", EntryMode::Regular, blob).unwrap();
    idx.add_file("foo.txt", EntryMode::Regular, blob).unwrap();
    idx.add_file("foo-bar", EntryMode::Regular, blob).unwrap();
    let root = build_tree(&store, &idx).unwrap();

    let names: Vec<_> = store
        .read_tree(&root)
        .unwrap()
        .entries
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["foo-bar", "foo.txt", "foo"]);
}

// ---------------------------------------------------------------------------
// Overlay round trip
// ---------------------------------------------------------------------------

#[test]
fn nested_files_round_trip_through_commit() {
    let (store, refs) = setup();
    let mut fs = overlay(&store, &refs);
    let mut expected = BTreeMap::new();
    for i in 0..24 {
        let dir = format!("d{}/e{}", i % 3, i % 4);
        let path = format!("{dir}/f{i}.txt");
        let content = format!("file {i}").into_bytes();
        fs.create_dir_all(&dir).unwrap();
        fs.write_file(&path, &content).unwrap();
        expected.insert(path, content);
    }
    let outcome = fs.commit("many files", &sig()).unwrap();

    let view = ReadOnlyView::from_ref(store.clone(), refs.as_ref(), "HEAD").unwrap();
    assert_eq!(view.root_tree(), outcome.tree);
    for (path, content) in &expected {
        assert_eq!(&view.read(path).unwrap(), content, "{path}");
    }
    let mut top = view.open_dir("/").unwrap();
    assert_eq!(top.read_dir_names(0).unwrap(), ["d0", "d1", "d2"]);
}

#[test]
fn paginated_listing_ends_with_end_of_sequence() {
    let (store, refs) = setup();
    let mut fs = overlay(&store, &refs);
    for dir in ["dir/dir2", "dir/dir3", "dir/dir4"] {
        fs.create_dir_all(dir).unwrap();
        fs.write_file(&format!("{dir}/keep"), b"").unwrap();
    }
    fs.commit("dirs", &sig()).unwrap();

    let view = ReadOnlyView::from_ref(store.clone(), refs.as_ref(), "HEAD").unwrap();
    let mut dir = view.open_dir("dir").unwrap();
    assert_eq!(dir.read_dir_names(1).unwrap(), ["dir2"]);
    assert_eq!(dir.read_dir_names(2).unwrap(), ["dir3", "dir4"]);
    let end = dir.read_dir_names(1).unwrap_err();
    assert!(end.is_end_of_sequence());
}

#[test]
fn overlay_writes_do_not_touch_the_base_view() {
    let (store, refs) = setup();
    let mut fs = overlay(&store, &refs);
    fs.write_file("config", b"v1").unwrap();
    fs.commit("v1", &sig()).unwrap();

    let pinned = ReadOnlyView::from_ref(store.clone(), refs.as_ref(), "HEAD").unwrap();
    let objects = store.len();
    fs.write_file("config", b"v2").unwrap();
    fs.write_file("extra", b"new").unwrap();
    fs.remove("config").unwrap();

    assert_eq!(pinned.read("config").unwrap(), b"v1");
    assert!(!pinned.exists("extra").unwrap());
    assert_eq!(store.len(), objects);
}

// ---------------------------------------------------------------------------
// References and commits
// ---------------------------------------------------------------------------

#[test]
fn commits_follow_symbolic_chain_and_link_parents() {
    let (store, refs) = setup();
    refs.write_ref("refs/heads/alias", &Ref::Symbolic("HEAD".into())).unwrap();
    let config = VfsConfig {
        reference: "refs/heads/alias".into(),
        ..VfsConfig::default()
    };

    let mut fs = CopyOnWriteOverlay::open(store.clone(), refs.clone(), &config).unwrap();
    fs.write_file("a", b"1").unwrap();
    let first = fs.commit("one", &sig()).unwrap();
    fs.write_file("a", b"2").unwrap();
    let second = fs.commit("two", &sig()).unwrap();

    assert_eq!(first.reference, "refs/heads/main");
    assert_eq!(second.parent, Some(first.commit));
    assert_eq!(
        refs.read_ref("refs/heads/main").unwrap(),
        Some(Ref::Direct(second.commit))
    );
    assert_eq!(
        refs.read_ref("refs/heads/alias").unwrap(),
        Some(Ref::Symbolic("HEAD".into()))
    );

    let commit = store.read_commit(&second.commit).unwrap();
    assert_eq!(commit.parents, vec![first.commit]);
    assert_eq!(commit.tree, second.tree);
    assert_eq!(commit.message, "two");
}

#[test]
fn stage_then_commit_keeps_history_and_directories() {
    let (store, refs) = setup();
    let mut fs = overlay(&store, &refs);
    fs.write_file("src/main.rs", b"fn main() {}").unwrap();
    fs.create_dir_all("assets/icons").unwrap();
    let first = fs.commit("layout", &sig()).unwrap();

    fs.write_file("src/main.rs", b"fn main() { run() }").unwrap();
    fs.remove_all("assets").unwrap();
    fs.create_dir_all("target/debug").unwrap();
    let index_store = InMemoryIndexStore::new();
    let mut index = StagingIndex::new(store.clone());
    let staged = fs.stage(&mut index, &index_store).unwrap();
    assert_eq!(staged.files, 1);
    assert_eq!(
        refs.read_ref("refs/heads/main").unwrap(),
        Some(Ref::Direct(first.commit))
    );

    fs.write_file("src/run.rs", b"pub fn run() {}").unwrap();
    let second = fs.commit("after stage", &sig()).unwrap();
    assert_eq!(second.parent, Some(first.commit));
    let commit = store.read_commit(&second.commit).unwrap();
    assert_eq!(commit.parents, vec![first.commit]);

    let view = ReadOnlyView::from_commit(store.clone(), second.commit).unwrap();
    let root: Vec<String> = view.open_dir("").unwrap().read_dir_names(0).unwrap();
    assert_eq!(root, ["src", "target"]);
    assert_eq!(view.read("src/main.rs").unwrap(), b"fn main() { run() }");
    assert_eq!(view.read("src/run.rs").unwrap(), b"pub fn run() {}");
    assert!(view.open_dir("target/debug").unwrap().read_dir(0).unwrap().is_empty());
    assert!(matches!(view.metadata("assets"), Err(VfsError::NotFound { .. })));

    let saved = StagingIndex::load(store.clone(), &index_store).unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved.get("src/main.rs").is_some());
}

#[test]
fn symbolic_loop_is_an_error() {
    let (store, refs) = setup();
    refs.write_ref("refs/heads/a", &Ref::Symbolic("refs/heads/b".into())).unwrap();
    refs.write_ref("refs/heads/b", &Ref::Symbolic("refs/heads/a".into())).unwrap();
    assert!(matches!(
        ReadOnlyView::from_ref(store, refs.as_ref(), "refs/heads/a"),
        Err(VfsError::Ref(_))
    ));
}

#[test]
fn read_only_view_rejects_every_mutation() {
    let (store, refs) = setup();
    let mut fs = overlay(&store, &refs);
    fs.create_dir("dir").unwrap();
    fs.write_file("dir/file", b"x").unwrap();
    fs.commit("base", &sig()).unwrap();

    let mut view = ReadOnlyView::from_ref(store.clone(), refs.as_ref(), "HEAD").unwrap();
    let results = [
        view.create_dir("new"),
        view.create_dir_all("new/deeper"),
        view.create_file("new.txt", b""),
        view.write_file("dir/file", b"y"),
        view.remove("dir/file"),
        view.remove_all("dir"),
        view.rename("dir", "moved"),
        view.set_mode("dir/file", EntryMode::Executable),
        view.set_modified("dir/file", std::time::SystemTime::now()),
    ];
    for result in results {
        assert!(matches!(result, Err(VfsError::PermissionDenied { .. })), "{result:?}");
    }
    assert_eq!(view.read("dir/file").unwrap(), b"x");
}

// ---------------------------------------------------------------------------
// Repository on disk
// ---------------------------------------------------------------------------

#[test]
fn disk_repository_round_trip() {
    let work = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(work.path().join("pkg/src")).unwrap();
    std::fs::write(work.path().join("pkg/src/lib.rs"), "pub fn f() {}").unwrap();
    std::fs::write(work.path().join("notes.txt"), "notes").unwrap();
    std::fs::write(work.path().join(".arborignore"), "*.log\n").unwrap();
    std::fs::write(work.path().join("debug.log"), "noise").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    repo.import(work.path()).unwrap();
    let mut index = repo.load_index().unwrap();
    let first = repo.commit_index(&mut index, "import", &repo.signature()).unwrap();

    let mut fs = repo.overlay().unwrap();
    assert!(!fs.exists("debug.log").unwrap());
    fs.rename("notes.txt", "pkg/NOTES").unwrap();
    let second = fs.commit("move notes", &repo.signature()).unwrap();
    assert_eq!(second.parent, Some(first.commit));
    drop(fs);
    drop(repo);

    let repo = Repository::open(dir.path()).unwrap();
    let view = repo.view().unwrap();
    assert_eq!(view.commit(), Some(second.commit));
    assert_eq!(view.read("pkg/NOTES").unwrap(), b"notes");
    assert_eq!(view.read("pkg/src/lib.rs").unwrap(), b"pub fn f() {}");
    assert!(!view.exists("notes.txt").unwrap());

    let old = repo.view_at(&first.commit.to_hex()).unwrap();
    assert!(old.exists("notes.txt").unwrap());
    assert_eq!(
        repo.list_refs("refs/").unwrap(),
        vec![("refs/heads/main".to_string(), Ref::Direct(second.commit))]
    );
}
