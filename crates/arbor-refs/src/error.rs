//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found, or resolves to a reference that does
    /// not exist yet.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The reference name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A compare-and-swap found a different value than expected.
    #[error("ref {name} changed concurrently (expected {expected}, found {actual})")]
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },

    /// Another writer holds the lock on this reference.
    #[error("ref is locked: {name}")]
    Locked { name: String },

    /// A symbolic chain loops back on itself or is too deep to follow.
    #[error("symbolic ref loop starting at {name} (depth {depth})")]
    SymbolicLoop { name: String, depth: usize },

    /// A stored reference could not be parsed.
    #[error("corrupt ref {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
