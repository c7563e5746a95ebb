use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, RwLock};

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

#[derive(Default)]
struct Slots {
    by_id: HashMap<ObjectId, Arc<StoredObject>>,
    bytes: u64,
}

/// Object store that keeps everything in process memory.
///
/// Used for scratch repositories and tests. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryObjectStore {
    slots: RwLock<Slots>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects held.
    pub fn len(&self) -> usize {
        self.slots.read().expect("lock poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the data sizes of all held objects.
    pub fn total_bytes(&self) -> u64 {
        self.slots.read().expect("lock poisoned").bytes
    }

    fn get(&self, id: &ObjectId) -> Option<Arc<StoredObject>> {
        self.slots.read().expect("lock poisoned").by_id.get(id).cloned()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.get(id).map(|obj| StoredObject::clone(&obj)))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut slots = self.slots.write().expect("lock poisoned");
        if !slots.by_id.contains_key(&id) {
            slots.bytes += object.size;
            slots.by_id.insert(id, Arc::new(object.clone()));
        }
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.slots.read().expect("lock poisoned").by_id.contains_key(id))
    }

    fn object_size(&self, id: &ObjectId) -> StoreResult<Option<u64>> {
        Ok(self.get(id).map(|obj| obj.size))
    }

    fn open_reader(&self, id: &ObjectId) -> StoreResult<Option<Box<dyn Read + Send>>> {
        Ok(self.get(id).map(|obj| {
            let shared = SharedData(obj);
            Box::new(Cursor::new(shared)) as Box<dyn Read + Send>
        }))
    }
}

/// Borrows an object's bytes without copying them out of the store.
struct SharedData(Arc<StoredObject>);

impl AsRef<[u8]> for SharedData {
    fn as_ref(&self) -> &[u8] {
        &self.0.data
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read().expect("lock poisoned");
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &slots.by_id.len())
            .field("bytes", &slots.bytes)
            .finish()
    }
}
