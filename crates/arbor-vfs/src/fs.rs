//! The hierarchical filesystem contract both views implement.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::SystemTime;

use arbor_store::{EntryMode, ObjectStore, ObjectStoreExt};
use arbor_types::ObjectId;

use crate::error::{VfsError, VfsResult};
use crate::path;

/// Metadata for one entry.
///
/// `name`, `mode` and `is_dir` are always available. Trees record neither
/// size nor modification time, so for entries served straight from a tree
/// `size` and `modified` fail with [`VfsError::Unimplemented`]. Entries
/// buffered in an overlay report whatever the overlay knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    path: String,
    mode: EntryMode,
    object_id: Option<ObjectId>,
    size: Option<u64>,
    modified: Option<SystemTime>,
}

impl FileInfo {
    pub(crate) fn from_tree(path: String, mode: EntryMode, object_id: ObjectId) -> Self {
        Self {
            path,
            mode,
            object_id: Some(object_id),
            size: None,
            modified: None,
        }
    }

    pub(crate) fn buffered(
        path: String,
        mode: EntryMode,
        object_id: Option<ObjectId>,
        size: Option<u64>,
        modified: Option<SystemTime>,
    ) -> Self {
        Self {
            path,
            mode,
            object_id,
            size,
            modified,
        }
    }

    /// Final path segment (`/` for the root).
    pub fn name(&self) -> &str {
        path::file_name(&self.path)
    }

    /// Full normalized path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// Hash of the backing blob or tree, if the content is already stored.
    pub fn object_id(&self) -> Option<ObjectId> {
        self.object_id
    }

    pub fn size(&self) -> VfsResult<u64> {
        self.size.ok_or_else(|| VfsError::Unimplemented {
            op: "size",
            path: path::display(&self.path),
        })
    }

    pub fn modified(&self) -> VfsResult<SystemTime> {
        self.modified.ok_or_else(|| VfsError::Unimplemented {
            op: "modified",
            path: path::display(&self.path),
        })
    }
}

enum Source {
    /// Blob in the store; the stream is opened on first read.
    Stored {
        store: Arc<dyn ObjectStore>,
        id: ObjectId,
        stream: Option<Box<dyn Read + Send>>,
    },
    Buffered(Arc<[u8]>),
}

/// An open file.
///
/// Sequential reads stream from the store. The first [`File::read_at`] or
/// [`Seek`] that moves the cursor loads the whole blob into memory; after
/// that every read is served from the buffer.
pub struct File {
    info: FileInfo,
    source: Source,
    pos: u64,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.info.path)
            .field("pos", &self.pos)
            .field("buffered", &matches!(self.source, Source::Buffered(_)))
            .finish()
    }
}

impl File {
    pub(crate) fn stored(info: FileInfo, store: Arc<dyn ObjectStore>, id: ObjectId) -> Self {
        Self {
            info,
            source: Source::Stored {
                store,
                id,
                stream: None,
            },
            pos: 0,
        }
    }

    pub(crate) fn buffered(info: FileInfo, data: Arc<[u8]>) -> Self {
        Self {
            info,
            source: Source::Buffered(data),
            pos: 0,
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Read up to `buf.len()` bytes at `offset` without moving the cursor.
    /// Returns `Ok(0)` at or past the end.
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.buffer()?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn buffer(&mut self) -> io::Result<Arc<[u8]>> {
        let data: Arc<[u8]> = match &self.source {
            Source::Buffered(data) => return Ok(Arc::clone(data)),
            Source::Stored { store, id, .. } => {
                store.read_blob(id).map_err(io::Error::other)?.data.into()
            }
        };
        self.source = Source::Buffered(Arc::clone(&data));
        Ok(data)
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.source {
            Source::Buffered(data) => {
                let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                n
            }
            Source::Stored { store, id, stream } => {
                if stream.is_none() {
                    let opened = store.open_reader(id).map_err(io::Error::other)?.ok_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, format!("blob {id} missing"))
                    })?;
                    *stream = Some(opened);
                }
                match stream {
                    Some(reader) => reader.read(buf)?,
                    None => 0,
                }
            }
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for File {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let new_pos = match target {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(delta) => self.pos as i128 + delta as i128,
            SeekFrom::End(delta) => self.buffer()?.len() as i128 + delta as i128,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        let new_pos = new_pos as u64;
        if new_pos != self.pos {
            self.buffer()?;
            self.pos = new_pos;
        }
        Ok(self.pos)
    }
}

/// An open directory with a private listing cursor.
#[derive(Debug)]
pub struct Dir {
    path: String,
    entries: Vec<FileInfo>,
    cursor: usize,
}

impl Dir {
    pub(crate) fn new(path: String, entries: Vec<FileInfo>) -> Self {
        Self {
            path,
            entries,
            cursor: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Entries not yet returned.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// Next `n` entries in canonical tree order.
    ///
    /// With `n > 0`, returns between 1 and `n` entries, or
    /// [`VfsError::EndOfSequence`] once the listing is exhausted. With
    /// `n <= 0`, returns everything not yet returned, which may be nothing;
    /// that is never an error.
    pub fn read_dir(&mut self, n: isize) -> VfsResult<Vec<FileInfo>> {
        let remaining = self.remaining();
        let take = if n <= 0 {
            remaining
        } else if remaining == 0 {
            return Err(VfsError::EndOfSequence {
                op: "readdir",
                path: path::display(&self.path),
            });
        } else {
            remaining.min(n as usize)
        };
        let out = self.entries[self.cursor..self.cursor + take].to_vec();
        self.cursor += take;
        Ok(out)
    }

    /// Like [`Dir::read_dir`], returning names only.
    pub fn read_dir_names(&mut self, n: isize) -> VfsResult<Vec<String>> {
        Ok(self
            .read_dir(n)?
            .into_iter()
            .map(|info| info.name().to_string())
            .collect())
    }
}

/// POSIX-like access to a tree of files.
///
/// Paths are slash-separated and relative to the view's root; a leading
/// slash is accepted. Mutations take `&mut self`: a view has a single
/// writer.
pub trait FileSystem {
    /// Stat `path`.
    fn metadata(&self, path: &str) -> VfsResult<FileInfo>;

    fn open_file(&self, path: &str) -> VfsResult<File>;

    fn open_dir(&self, path: &str) -> VfsResult<Dir>;

    /// Whole content of the file at `path`.
    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut file = self.open_file(path)?;
        let mut out = Vec::new();
        file.read_to_end(&mut out)?;
        Ok(out)
    }

    fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a single directory; the parent must exist.
    fn create_dir(&mut self, path: &str) -> VfsResult<()>;

    /// Create a directory and any missing parents.
    fn create_dir_all(&mut self, path: &str) -> VfsResult<()>;

    /// Create a new file; fails if anything exists at `path`.
    fn create_file(&mut self, path: &str, content: &[u8]) -> VfsResult<()>;

    /// Create or truncate a file. An existing file keeps its mode.
    fn write_file(&mut self, path: &str, content: &[u8]) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&mut self, path: &str) -> VfsResult<()>;

    /// Remove `path` and everything beneath it. Missing paths are fine.
    fn remove_all(&mut self, path: &str) -> VfsResult<()>;

    fn rename(&mut self, from: &str, to: &str) -> VfsResult<()>;

    /// chmod: switch a file between regular, executable and symlink.
    fn set_mode(&mut self, path: &str, mode: EntryMode) -> VfsResult<()>;

    /// chtimes.
    fn set_modified(&mut self, path: &str, modified: SystemTime) -> VfsResult<()>;
}
