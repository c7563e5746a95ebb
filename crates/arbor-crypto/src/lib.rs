//! Content hashing for Arbor.
//!
//! Provides domain-separated BLAKE3 hashing. Each object kind hashes under
//! its own domain tag, so a blob and a tree with identical bytes never share
//! an identifier. All crypto operations wrap established libraries.

pub mod hasher;

pub use hasher::ContentHasher;
