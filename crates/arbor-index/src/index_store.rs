//! Where a serialized [`StagingIndex`](crate::StagingIndex) lives between
//! sessions.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::IndexResult;

/// Byte-level persistence for the staging index.
pub trait IndexStore: Send + Sync {
    /// The last saved index, or `None` if nothing was ever saved.
    fn read_index(&self) -> IndexResult<Option<Vec<u8>>>;

    /// Replace the saved index.
    fn write_index(&self, bytes: &[u8]) -> IndexResult<()>;
}

/// Keeps the index bytes in memory.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for InMemoryIndexStore {
    fn read_index(&self) -> IndexResult<Option<Vec<u8>>> {
        Ok(self.bytes.read().expect("lock poisoned").clone())
    }

    fn write_index(&self, bytes: &[u8]) -> IndexResult<()> {
        *self.bytes.write().expect("lock poisoned") = Some(bytes.to_vec());
        Ok(())
    }
}

/// Keeps the index in a single file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileIndexStore {
    path: PathBuf,
}

impl FileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexStore for FileIndexStore {
    fn read_index(&self) -> IndexResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_index(&self, bytes: &[u8]) -> IndexResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "index file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_starts_empty() {
        let store = InMemoryIndexStore::new();
        assert_eq!(store.read_index().unwrap(), None);
        store.write_index(b"abc").unwrap();
        assert_eq!(store.read_index().unwrap().as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIndexStore::new(dir.path().join("index"));
        assert_eq!(store.read_index().unwrap(), None);
    }

    #[test]
    fn file_store_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIndexStore::new(dir.path().join("nested/index"));
        store.write_index(b"first").unwrap();
        store.write_index(b"second").unwrap();
        assert_eq!(store.read_index().unwrap().as_deref(), Some(&b"second"[..]));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested")).unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, ["index"]);
    }
}
