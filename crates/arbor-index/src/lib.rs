//! Staging index and Merkle tree building for Arbor.
//!
//! Turns flat `path -> (hash, mode)` listings into canonical, content-addressed
//! tree objects, and back.
//!
//! # Key Types
//!
//! - [`PathIndexer`] -- directory skeleton built from flat paths
//! - [`TreeEncoder`] -- bottom-up writer of tree objects
//! - [`StagingIndex`] -- persistent path-to-blob map with `write_tree`/`read_tree`
//! - [`IndexStore`] -- where a serialized index is kept
//! - [`import_directory`] -- stage a live directory

pub mod entry;
pub mod error;
pub mod index;
pub mod index_store;
pub mod observe;
pub mod tree_builder;
pub mod workdir;

pub use entry::IndexEntry;
pub use error::{IndexError, IndexResult};
pub use index::{StagingIndex, INDEX_VERSION};
pub use index_store::{FileIndexStore, InMemoryIndexStore, IndexStore};
pub use observe::{NoopObserver, TreeObserver};
pub use tree_builder::{
    build_tree, join_path, split_path, PathIndexer, PendingEntry, TreeEncoder, ROOT,
};
pub use workdir::{import_directory, ImportOptions, ImportSummary, IGNORE_FILE_NAME};
