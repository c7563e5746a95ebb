//! Filesystem views over Arbor trees.
//!
//! A [`ReadOnlyView`] serves paths straight from a persisted Merkle tree. A
//! [`CopyOnWriteOverlay`] layers buffered writes over such a view and turns
//! them into a new tree, a commit and a reference update on
//! [`CopyOnWriteOverlay::commit`]. Both implement [`FileSystem`].
//!
//! # Key Types
//!
//! - [`FileSystem`], [`File`], [`Dir`], [`FileInfo`] -- the filesystem contract
//! - [`ReadOnlyView`] -- immutable view of one tree
//! - [`CopyOnWriteOverlay`] -- writable view with commit/stage
//! - [`CommitBuilder`] -- commit a tree and advance a reference
//! - [`Repository`] -- stores, refs, index and config wired together
//! - [`Observer`] / [`TracingObserver`] -- per-instance event hooks

pub mod commit;
pub mod config;
pub mod error;
pub mod fs;
pub mod observer;
pub mod overlay;
pub mod path;
pub mod repository;
mod scratch;
pub mod view;

pub use commit::{CommitBuilder, CommitOutcome};
pub use config::{AuthorConfig, VfsConfig};
pub use error::{VfsError, VfsResult};
pub use fs::{Dir, File, FileInfo, FileSystem};
pub use observer::{Observer, TracingObserver};
pub use overlay::{CopyOnWriteOverlay, StageSummary};
pub use repository::Repository;
pub use view::ReadOnlyView;
