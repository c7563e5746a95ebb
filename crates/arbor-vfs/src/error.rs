use arbor_store::EntryMode;
use thiserror::Error;

/// Errors from filesystem views, overlays and repositories.
///
/// Path-level variants carry the operation that failed and the offending
/// path.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("{op} {path}: no such file or directory")]
    NotFound { op: &'static str, path: String },

    #[error("{op} {path}: not a directory")]
    NotADirectory { op: &'static str, path: String },

    #[error("{op} {path}: is a directory")]
    IsADirectory { op: &'static str, path: String },

    #[error("{op} {path}: permission denied")]
    PermissionDenied { op: &'static str, path: String },

    #[error("{op} {path}: already exists")]
    AlreadyExists { op: &'static str, path: String },

    #[error("{op} {path}: directory not empty")]
    DirectoryNotEmpty { op: &'static str, path: String },

    #[error("{op} {path:?}: {reason}")]
    InvalidPath {
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("{op} {path}: mode {mode} not allowed")]
    InvalidMode {
        op: &'static str,
        path: String,
        mode: EntryMode,
    },

    /// A directory listing asked for more entries after the last one.
    #[error("{op} {path}: end of directory")]
    EndOfSequence { op: &'static str, path: String },

    /// Metadata the backing tree does not record.
    #[error("{op} {path}: not implemented")]
    Unimplemented { op: &'static str, path: String },

    /// The reference kept moving under concurrent commits.
    #[error("ref {name} changed concurrently, gave up after {attempts} attempts")]
    RefUpdateConflict { name: String, attempts: u32 },

    /// The reference no longer points at the commit the overlay was opened on.
    #[error("ref {name} moved from {expected} to {actual}")]
    StaleBase {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] arbor_refs::RefError),

    #[error("index error: {0}")]
    Index(#[from] arbor_index::IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound { .. })
    }

    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, VfsError::EndOfSequence { .. })
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
