//! Foundation types for Arbor.
//!
//! Every other Arbor crate depends on `arbor-types`. It deliberately carries
//! no hashing logic of its own: an [`ObjectId`] is an opaque 32-byte digest,
//! and the domain-separated hashing lives in `arbor-crypto`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 digest)
//! - [`Signature`] -- Author/committer identity plus a wall-clock timestamp

pub mod error;
pub mod object;
pub mod signature;

pub use error::TypeError;
pub use object::ObjectId;
pub use signature::Signature;
