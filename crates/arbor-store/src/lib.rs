//! Content-addressed object storage for Arbor.
//!
//! Every piece of repository data (file contents, directory listings,
//! commits) is stored as an immutable object identified by its BLAKE3 hash,
//! domain-separated by object kind.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing in canonical entry order
//! - [`CommitObject`] -- root tree plus parent linkage and authorship
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`DiskObjectStore`] -- zstd-compressed loose objects on disk
//!
//! [`ObjectStoreExt`] adds typed read/write helpers to any store.

pub mod disk;
pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use disk::DiskObjectStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{
    canonical_name_cmp, Blob, CommitObject, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry,
};
pub use traits::{ObjectStore, ObjectStoreExt};
