use arbor_types::ObjectId;

/// Failures reported by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// Bytes read back under `id` hash to something else.
    #[error("object {id} is damaged: its content hashes to {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// A tree or commit could not be encoded or decoded.
    #[error("cannot encode object: {0}")]
    Serialization(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Wrong kind, bad header, or undecodable payload.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    #[error("the null object id cannot be stored")]
    NullObjectId,
}

pub type StoreResult<T> = Result<T, StoreError>;
