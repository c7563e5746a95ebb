//! Filesystem-backed reference store.
//!
//! Each reference is a small text file under the store root whose relative
//! path is the reference name (`HEAD`, `refs/heads/main`). The content is
//! either a hex object ID or `ref: <name>`.
//!
//! Updates take an exclusive `<name>.lock` file (created with `create_new`),
//! write the new value into it, and rename it over the reference. Holding the
//! lock across the read-compare-write makes compare-and-swap atomic across
//! processes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::{describe, RefStore};
use crate::types::Ref;

const LOCK_SUFFIX: &str = ".lock";

/// A [`RefStore`] that keeps one file per reference.
#[derive(Debug)]
pub struct FileRefStore {
    root: PathBuf,
}

impl FileRefStore {
    /// Open (or create) a ref store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn read_path(&self, name: &str, path: &Path) -> Result<Option<Ref>> {
        match fs::read_to_string(path) {
            Ok(text) => text.parse().map(Some).map_err(|e| match e {
                RefError::Corrupt { reason, .. } => RefError::Corrupt {
                    name: name.to_string(),
                    reason,
                },
                other => other,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn lock(&self, name: &str) -> Result<RefLock> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => RefError::Locked {
                    name: name.to_string(),
                },
                _ => RefError::Io(e),
            })?;
        Ok(RefLock {
            file,
            lock_path,
            target: path,
            committed: false,
        })
    }
}

/// An acquired `<name>.lock` file. Dropping it without committing removes
/// the lock and leaves the reference untouched.
struct RefLock {
    file: File,
    lock_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl RefLock {
    fn commit(mut self, value: &Ref) -> Result<()> {
        writeln!(self.file, "{value}")?;
        self.file.sync_all()?;
        fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

impl RefStore for FileRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<Ref>> {
        validate_ref_name(name)?;
        self.read_path(name, &self.ref_path(name))
    }

    fn write_ref(&self, name: &str, reference: &Ref) -> Result<()> {
        validate_ref_name(name)?;
        let lock = self.lock(name)?;
        lock.commit(reference)?;
        debug!(name, value = %reference, "ref written");
        Ok(())
    }

    fn compare_and_swap(&self, name: &str, expected: Option<&Ref>, new: &Ref) -> Result<()> {
        validate_ref_name(name)?;
        let lock = self.lock(name)?;
        let current = self.read_path(name, &lock.target)?;
        if current.as_ref() != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected: describe(expected),
                actual: describe(current.as_ref()),
            });
        }
        lock.commit(new)?;
        debug!(name, value = %new, "ref updated");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        validate_ref_name(name)?;
        let lock = self.lock(name)?;
        let existed = match fs::remove_file(&lock.target) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        drop(lock);
        if existed {
            debug!(name, "ref deleted");
        }
        Ok(existed)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Ref)>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.depth() != 1 || e.file_type().is_file() || e.file_name() == "refs");
        for entry in walker {
            let entry = entry.map_err(|e| RefError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.ends_with(LOCK_SUFFIX) || !name.starts_with(prefix) {
                continue;
            }
            if validate_ref_name(&name).is_err() {
                continue;
            }
            if let Some(value) = self.read_path(&name, entry.path())? {
                out.push((name, value));
            }
        }
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use arbor_types::ObjectId;

    use super::*;
    use crate::traits::contract;

    fn temp_store() -> (tempfile::TempDir, FileRefStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRefStore::open(dir.path().join("refs-root")).unwrap();
        (dir, store)
    }

    #[test]
    fn write_read_delete() {
        let (_dir, store) = temp_store();
        contract::write_read_delete(&store);
    }

    #[test]
    fn symbolic_values() {
        let (_dir, store) = temp_store();
        contract::symbolic_values(&store);
    }

    #[test]
    fn rejects_invalid_names() {
        let (_dir, store) = temp_store();
        contract::rejects_invalid_names(&store);
    }

    #[test]
    fn compare_and_swap() {
        let (_dir, store) = temp_store();
        contract::compare_and_swap(&store);
    }

    #[test]
    fn list_by_prefix() {
        let (_dir, store) = temp_store();
        contract::list_by_prefix(&store);
    }

    #[test]
    fn file_format_is_plain_text() {
        let (_dir, store) = temp_store();
        let id = ObjectId::from_hash([7; 32]);
        store.write_ref("refs/heads/main", &Ref::Direct(id)).unwrap();
        store
            .write_ref("HEAD", &Ref::Symbolic("refs/heads/main".into()))
            .unwrap();

        let head = fs::read_to_string(store.root().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
        let main = fs::read_to_string(store.root().join("refs/heads/main")).unwrap();
        assert_eq!(main.trim(), id.to_hex());
    }

    #[test]
    fn held_lock_blocks_updates() {
        let (_dir, store) = temp_store();
        let held = store.lock("refs/heads/main").unwrap();
        let err = store
            .write_ref("refs/heads/main", &Ref::Direct(ObjectId::from_hash([1; 32])))
            .unwrap_err();
        assert!(matches!(err, RefError::Locked { .. }));
        drop(held);
        store
            .write_ref("refs/heads/main", &Ref::Direct(ObjectId::from_hash([1; 32])))
            .unwrap();
    }

    #[test]
    fn failed_cas_releases_lock() {
        let (_dir, store) = temp_store();
        let a = Ref::Direct(ObjectId::from_hash([1; 32]));
        let b = Ref::Direct(ObjectId::from_hash([2; 32]));
        store.write_ref("refs/heads/main", &a).unwrap();
        assert!(store.compare_and_swap("refs/heads/main", Some(&b), &b).is_err());
        assert!(!store.root().join("refs/heads/main.lock").exists());
        store.compare_and_swap("refs/heads/main", Some(&a), &b).unwrap();
    }

    #[test]
    fn corrupt_file_reports_name() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.root().join("refs/heads")).unwrap();
        fs::write(store.root().join("refs/heads/bad"), "garbage").unwrap();
        match store.read_ref("refs/heads/bad") {
            Err(RefError::Corrupt { name, .. }) => assert_eq!(name, "refs/heads/bad"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn list_skips_foreign_directories() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.root().join("objects/ab")).unwrap();
        fs::write(store.root().join("objects/ab/cdef"), "not a ref").unwrap();
        store
            .write_ref("refs/heads/main", &Ref::Direct(ObjectId::from_hash([4; 32])))
            .unwrap();
        let names: Vec<_> = store.list_refs("").unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["refs/heads/main"]);
    }

    #[test]
    fn refs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = ObjectId::from_hash([3; 32]);
        FileRefStore::open(dir.path()).unwrap()
            .write_ref("refs/heads/main", &Ref::Direct(id))
            .unwrap();
        let reopened = FileRefStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.read_ref("refs/heads/main").unwrap(),
            Some(Ref::Direct(id))
        );
    }
}
