use ftlog_types::{LogEntry, TypeError};

use crate::hasher::ContentHasher;

/// Chunk chain integrity verifier.
///
/// A log split into chunks forms a singly linked chain: every chunk after
/// the first opens with a chain header whose key and length describe the
/// full content of the chunk before it. Checking one link needs only the
/// two chunks involved; checking all of history means walking every link.
pub struct ChunkChainVerifier;

impl ChunkChainVerifier {
    /// Verify that `chunk` links to `predecessor`.
    ///
    /// Returns the chain header of `chunk` on success.
    pub fn verify_link(predecessor: &[u8], chunk: &[u8]) -> Result<LogEntry, ChainError> {
        Self::verify_link_at(predecessor, chunk, 1)
    }

    /// Verify a sequence of chunks, oldest first.
    ///
    /// Checks:
    /// 1. The first chunk carries no chain header
    /// 2. Every later chunk opens with a valid chain header
    /// 3. Each header's key and length match the preceding chunk's bytes
    pub fn verify_chain<C: AsRef<[u8]>>(chunks: &[C]) -> Result<(), ChainError> {
        let Some(first) = chunks.first() else {
            return Ok(());
        };

        if LogEntry::parse_chain_header(first.as_ref())
            .map_err(|source| ChainError::Header { index: 0, source })?
            .is_some()
        {
            return Err(ChainError::UnexpectedHeader);
        }

        for (i, pair) in chunks.windows(2).enumerate() {
            Self::verify_link_at(pair[0].as_ref(), pair[1].as_ref(), i + 1)?;
        }
        Ok(())
    }

    fn verify_link_at(
        predecessor: &[u8],
        chunk: &[u8],
        index: usize,
    ) -> Result<LogEntry, ChainError> {
        let (header, _) = LogEntry::parse_chain_header(chunk)
            .map_err(|source| ChainError::Header { index, source })?
            .ok_or(ChainError::MissingHeader { index })?;

        if header.length() as usize != predecessor.len() {
            return Err(ChainError::LengthMismatch {
                index,
                claimed: header.length(),
                actual: predecessor.len(),
            });
        }
        if !ContentHasher::for_key(header.key()).verify(predecessor, header.key()) {
            return Err(ChainError::KeyMismatch { index });
        }
        Ok(header)
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first chunk carries a chain header (it has no predecessor)")]
    UnexpectedHeader,

    #[error("chunk {index} has no chain header")]
    MissingHeader { index: usize },

    #[error("chunk {index} has an unreadable chain header: {source}")]
    Header {
        index: usize,
        #[source]
        source: TypeError,
    },

    #[error("chunk {index} claims a predecessor of {claimed} bytes, found {actual}")]
    LengthMismatch {
        index: usize,
        claimed: u32,
        actual: usize,
    },

    #[error("chunk {index}: predecessor content does not match the chained key")]
    KeyMismatch { index: usize },
}
