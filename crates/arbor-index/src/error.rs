//! Error types for the index crate.

use arbor_store::EntryMode;
use arbor_types::ObjectId;

/// Errors that can occur during index and tree-building operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The specified path was not found in the index.
    #[error("path not found in index: {0}")]
    PathNotFound(String),

    /// An invalid path was provided.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path is used both as a file and as a directory.
    #[error("path conflict at {path}: {reason}")]
    PathConflict { path: String, reason: String },

    /// A mode that cannot be used for this kind of entry.
    #[error("invalid mode {mode:?} for {path}")]
    InvalidMode { path: String, mode: EntryMode },

    /// A non-directory entry reached tree encoding without a content hash.
    #[error("no content hash for file entry: {0}")]
    MissingContent(String),

    /// An object referenced by the index was not found in the store.
    #[error("object not found in store: {0}")]
    ObjectNotFound(ObjectId),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Directory walk failure during import.
    #[error("walk error: {0}")]
    Walk(String),

    /// I/O error reading files or persisting the index.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
