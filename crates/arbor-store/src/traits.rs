use std::io::{Cursor, Read};

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, CommitObject, StoredObject, Tree};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same data always produces the
///   same ID, so writes are idempotent.
/// - Concurrent reads are always safe (objects are immutable).
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Size in bytes of the object's data, without necessarily loading it.
    fn object_size(&self, id: &ObjectId) -> StoreResult<Option<u64>> {
        Ok(self.read(id)?.map(|obj| obj.size))
    }

    /// Open a streaming reader over the object's data.
    ///
    /// The default implementation loads the whole object. Backends that keep
    /// objects outside memory override this to stream.
    fn open_reader(&self, id: &ObjectId) -> StoreResult<Option<Box<dyn Read + Send>>> {
        Ok(self
            .read(id)?
            .map(|obj| Box::new(Cursor::new(obj.data)) as Box<dyn Read + Send>))
    }
}

/// Typed helpers over any [`ObjectStore`].
pub trait ObjectStoreExt: ObjectStore {
    /// Read an object, failing with [`StoreError::NotFound`] if absent.
    fn read_required(&self, id: &ObjectId) -> StoreResult<StoredObject> {
        self.read(id)?.ok_or(StoreError::NotFound(*id))
    }

    fn read_blob(&self, id: &ObjectId) -> StoreResult<Blob> {
        Blob::from_stored_object(&self.read_required(id)?)
    }

    fn read_tree(&self, id: &ObjectId) -> StoreResult<Tree> {
        Tree::from_stored_object(&self.read_required(id)?)
    }

    fn read_commit(&self, id: &ObjectId) -> StoreResult<CommitObject> {
        CommitObject::from_stored_object(&self.read_required(id)?)
    }

    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.write(&Blob::new(data.to_vec()).to_stored_object())
    }

    fn write_tree(&self, tree: &Tree) -> StoreResult<ObjectId> {
        self.write(&tree.to_stored_object()?)
    }

    fn write_commit(&self, commit: &CommitObject) -> StoreResult<ObjectId> {
        self.write(&commit.to_stored_object()?)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStoreExt for S {}
