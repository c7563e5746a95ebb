//! Reference management for Arbor.
//!
//! References are named pointers into the object store, analogous to git
//! refs. A reference is either *direct* (holds an object ID, normally a
//! commit) or *symbolic* (holds the name of another reference, as `HEAD`
//! usually does).
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- The [`Ref`] value type and its text form
//! - [`traits`] -- The [`RefStore`] trait defining the storage interface
//! - [`names`] -- Reference and branch name validation
//! - [`resolve`] -- Symbolic chain resolution and compare-and-swap updates
//! - [`memory`] -- In-memory [`InMemoryRefStore`]
//! - [`file`] -- One-file-per-ref [`FileRefStore`]

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod resolve;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::{branch_ref_name, validate_branch_name, validate_ref_name, HEADS_PREFIX};
pub use resolve::{peel_ref, resolve_ref, ResolvedRef, HEAD, MAX_SYMREF_DEPTH};
pub use traits::RefStore;
pub use types::Ref;
