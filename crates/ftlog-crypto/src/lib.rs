//! Content hashing and chunk chain verification for ftlog.
//!
//! Provides the BLAKE3-backed content hasher that produces 20- or 32-byte
//! [`ContentKey`](ftlog_types::ContentKey)s, and the verifier that checks a
//! rotated chunk against its predecessor.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod hasher;

pub use chain::{ChainError, ChunkChainVerifier};
pub use hasher::{entry_for_content, verify_entry_content, ContentHasher};
