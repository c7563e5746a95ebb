use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use arbor_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Length of the loose-object header: kind byte + little-endian u64 size.
const HEADER_LEN: usize = 9;

/// Default zstd compression level for loose objects.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Loose-object store on the local filesystem.
///
/// Each object lives in its own file at `<root>/<2 hex>/<62 hex>`:
///
/// ```text
/// [1 byte: object kind]
/// [8 bytes: uncompressed size (little-endian u64)]
/// [N bytes: zstd-compressed data]
/// ```
///
/// Files are written to a temporary file in the fan-out directory and renamed
/// into place, so readers never observe a partially written object. Every
/// read recomputes the content hash.
pub struct DiskObjectStore {
    root: PathBuf,
    compression_level: i32,
}

impl DiskObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    /// Override the zstd level used for new objects.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    fn open_object(&self, id: &ObjectId) -> StoreResult<Option<(File, ObjectKind, u64)>> {
        let mut file = match File::open(self.object_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header)
            .map_err(|e| corrupt(id, format!("short header: {e}")))?;
        let (kind, size) = parse_header(id, &header)?;
        Ok(Some((file, kind, size)))
    }
}

fn corrupt(id: &ObjectId, reason: impl Into<String>) -> StoreError {
    StoreError::CorruptObject {
        id: *id,
        reason: reason.into(),
    }
}

fn parse_header(id: &ObjectId, header: &[u8]) -> StoreResult<(ObjectKind, u64)> {
    if header.len() < HEADER_LEN {
        return Err(corrupt(id, "short header"));
    }
    let kind = ObjectKind::from_type_byte(header[0])
        .ok_or_else(|| corrupt(id, format!("unknown kind byte {}", header[0])))?;
    let mut size = [0u8; 8];
    size.copy_from_slice(&header[1..HEADER_LEN]);
    Ok((kind, u64::from_le_bytes(size)))
}

impl ObjectStore for DiskObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let bytes = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (kind, size) = parse_header(id, &bytes)?;
        let data = zstd::decode_all(&bytes[HEADER_LEN..])
            .map_err(|e| corrupt(id, format!("decompression failed: {e}")))?;
        if data.len() as u64 != size {
            return Err(corrupt(
                id,
                format!("size mismatch: header says {size}, got {}", data.len()),
            ));
        }

        let object = StoredObject::new(kind, data);
        let computed = object.compute_id();
        if computed != *id {
            warn!(id = %id, computed = %computed, "object failed hash verification");
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.is_file() {
            return Ok(id);
        }

        let hex = id.to_hex();
        let dir = self.root.join(&hex[..2]);
        fs::create_dir_all(&dir)?;

        let compressed = zstd::encode_all(object.data.as_slice(), self.compression_level)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&[object.kind.type_byte()])?;
        tmp.write_all(&object.size.to_le_bytes())?;
        tmp.write_all(&compressed)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(
            id = %id.short_hex(),
            kind = %object.kind,
            size = object.size,
            stored = compressed.len() + HEADER_LEN,
            "object written"
        );
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn object_size(&self, id: &ObjectId) -> StoreResult<Option<u64>> {
        Ok(self.open_object(id)?.map(|(_, _, size)| size))
    }

    fn open_reader(&self, id: &ObjectId) -> StoreResult<Option<Box<dyn Read + Send>>> {
        let Some((file, kind, size)) = self.open_object(id)? else {
            return Ok(None);
        };
        let decoder = zstd::stream::read::Decoder::new(file)?;
        Ok(Some(Box::new(VerifyingReader::new(decoder, kind, size, *id))))
    }
}

impl std::fmt::Debug for DiskObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskObjectStore")
            .field("root", &self.root)
            .field("compression_level", &self.compression_level)
            .finish()
    }
}

/// Hashes a decompressed stream as it is consumed and fails the final read
/// if the content does not match its object ID.
struct VerifyingReader<R> {
    inner: R,
    hasher: blake3::Hasher,
    expected: ObjectId,
    remaining: u64,
    verified: bool,
}

impl<R: Read> VerifyingReader<R> {
    fn new(inner: R, kind: ObjectKind, size: u64, expected: ObjectId) -> Self {
        Self {
            inner,
            hasher: kind.hasher().begin(size),
            expected,
            remaining: size,
            verified: false,
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        if self.remaining != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object {} truncated", self.expected.short_hex()),
            ));
        }
        let computed = ObjectId::from_hash(*self.hasher.finalize().as_bytes());
        if computed != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "hash mismatch for {}: content hashes to {}",
                    self.expected, computed
                ),
            ));
        }
        self.verified = true;
        Ok(())
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.finish()?;
            return Ok(0);
        }
        if n as u64 > self.remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object {} longer than its header", self.expected.short_hex()),
            ));
        }
        self.remaining -= n as u64;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, Tree};
    use crate::traits::ObjectStoreExt;

    fn temp_store() -> (tempfile::TempDir, DiskObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn write_and_read_roundtrip() {
        let (_dir, store) = temp_store();
        let obj = Blob::new(b"hello disk".to_vec()).to_stored_object();
        let id = store.write(&obj).unwrap();
        assert_eq!(store.read(&id).unwrap(), Some(obj));
        assert!(store.exists(&id).unwrap());
    }

    #[test]
    fn uses_fan_out_layout() {
        let (_dir, store) = temp_store();
        let id = store.write_blob(b"layout").unwrap();
        let hex = id.to_hex();
        let expected = store.root().join(&hex[..2]).join(&hex[2..]);
        assert!(expected.is_file());
    }

    #[test]
    fn missing_object_is_none() {
        let (_dir, store) = temp_store();
        let id = Blob::new(b"absent".to_vec()).to_stored_object().compute_id();
        assert!(store.read(&id).unwrap().is_none());
        assert!(!store.exists(&id).unwrap());
        assert!(store.object_size(&id).unwrap().is_none());
        assert!(store.open_reader(&id).unwrap().is_none());
    }

    #[test]
    fn objects_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects");
        let id = {
            let store = DiskObjectStore::open(&root).unwrap();
            store.write_tree(&Tree::empty()).unwrap()
        };
        let reopened = DiskObjectStore::open(&root).unwrap();
        assert!(reopened.read_tree(&id).unwrap().is_empty());
    }

    #[test]
    fn write_is_idempotent() {
        let (_dir, store) = temp_store();
        let id1 = store.write_blob(b"same").unwrap();
        let id2 = store.write_blob(b"same").unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn compresses_repetitive_content() {
        let (_dir, store) = temp_store();
        let data = vec![b'a'; 64 * 1024];
        let id = store.write_blob(&data).unwrap();
        let hex = id.to_hex();
        let on_disk = fs::metadata(store.root().join(&hex[..2]).join(&hex[2..])).unwrap().len();
        assert!(on_disk < data.len() as u64 / 10);
        assert_eq!(store.object_size(&id).unwrap(), Some(data.len() as u64));
    }

    #[test]
    fn body_is_compressed_at_the_chosen_level() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::open(dir.path()).unwrap().with_compression_level(19);
        let data = b"pub fn add(a: u32, b: u32) -> u32 { a + b }\n".repeat(100);
        let id = store.write_blob(&data).unwrap();

        let hex = id.to_hex();
        let raw = fs::read(store.root().join(&hex[..2]).join(&hex[2..])).unwrap();
        assert_eq!(raw[0], ObjectKind::Blob.type_byte());
        assert_eq!(&raw[HEADER_LEN..], zstd::encode_all(data.as_slice(), 19).unwrap().as_slice());
        assert_eq!(store.read_blob(&id).unwrap().data, data);
    }

    #[test]
    fn open_reader_streams_content() {
        let (_dir, store) = temp_store();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let id = store.write_blob(&data).unwrap();
        let mut out = Vec::new();
        store
            .open_reader(&id)
            .unwrap()
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    // -----------------------------------------------------------------------
    // Corruption detection
    // -----------------------------------------------------------------------

    fn swap_contents(store: &DiskObjectStore, victim: &ObjectId, source: &ObjectId) {
        let src = store.object_path(source);
        let dst = store.object_path(victim);
        fs::copy(src, dst).unwrap();
    }

    #[test]
    fn read_detects_hash_mismatch() {
        let (_dir, store) = temp_store();
        let good = store.write_blob(b"good").unwrap();
        let evil = store.write_blob(b"evil").unwrap();
        swap_contents(&store, &good, &evil);

        let err = store.read(&good).unwrap_err();
        assert!(matches!(
            err,
            StoreError::HashMismatch { id, computed } if id == good && computed == evil
        ));
    }

    #[test]
    fn streaming_read_detects_hash_mismatch() {
        let (_dir, store) = temp_store();
        let good = store.write_blob(b"good").unwrap();
        let evil = store.write_blob(b"evil").unwrap();
        swap_contents(&store, &good, &evil);

        let mut reader = store.open_reader(&good).unwrap().unwrap();
        let err = reader.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let (_dir, store) = temp_store();
        let id = store.write_blob(b"soon garbage").unwrap();
        fs::write(store.object_path(&id), b"\x09junk").unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }
}
