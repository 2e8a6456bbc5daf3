//! Chunk naming and chain inspection for rotated logs.
//!
//! A log named `bar` writes to `bar.log`. Rotation seals the active file as
//! `bar.000001.log`, `bar.000002.log`, ... and starts a fresh `bar.log`
//! whose first line is a chain header describing the sealed chunk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ftlog_crypto::ChunkChainVerifier;
use ftlog_types::{LogEntry, NodeId};

use crate::config::RotationPolicy;
use crate::error::Result;

/// Identities recorded in the chain header written by a rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationMeta {
    pub owner: NodeId,
    pub src: NodeId,
}

impl From<&RotationPolicy> for RotationMeta {
    fn from(policy: &RotationPolicy) -> Self {
        Self {
            owner: policy.owner,
            src: policy.src,
        }
    }
}

/// File name of the active (unsealed) chunk.
pub fn active_file_name(base_name: &str) -> String {
    format!("{base_name}.log")
}

/// File name of sealed chunk number `seq`.
pub fn chunk_file_name(base_name: &str, seq: u64) -> String {
    format!("{base_name}.{seq:06}.log")
}

/// Sequence number of a sealed chunk of `base_name`, if `file_name` is one.
pub fn parse_chunk_seq(base_name: &str, file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(base_name)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Sealed chunks of `base_name` in `dir`, oldest first.
pub fn sealed_chunks(dir: &Path, base_name: &str) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut chunks = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(chunks),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(seq) = name.to_str().and_then(|n| parse_chunk_seq(base_name, n)) {
            chunks.push((seq, entry.path()));
        }
    }
    chunks.sort_by_key(|(seq, _)| *seq);
    Ok(chunks)
}

/// Highest sealed chunk number of `base_name`, or 0 if none exist.
pub fn latest_chunk_seq(dir: &Path, base_name: &str) -> io::Result<u64> {
    Ok(sealed_chunks(dir, base_name)?
        .last()
        .map(|(seq, _)| *seq)
        .unwrap_or(0))
}

/// Every file of the chain, oldest first: sealed chunks, then the active
/// file if it exists.
pub fn chain_files(dir: &Path, base_name: &str) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = sealed_chunks(dir, base_name)?
        .into_iter()
        .map(|(_, path)| path)
        .collect();
    let active = dir.join(active_file_name(base_name));
    if active.exists() {
        files.push(active);
    }
    Ok(files)
}

/// Verify the whole on-disk chain of `base_name`.
///
/// Returns the chain headers found, one per link.
pub fn verify_log_chain(dir: &Path, base_name: &str) -> Result<Vec<LogEntry>> {
    let chunks = chain_files(dir, base_name)?
        .iter()
        .map(fs::read)
        .collect::<io::Result<Vec<_>>>()?;
    ChunkChainVerifier::verify_chain(&chunks)?;

    let mut headers = Vec::with_capacity(chunks.len().saturating_sub(1));
    for pair in chunks.windows(2) {
        headers.push(ChunkChainVerifier::verify_link(&pair[0], &pair[1])?);
    }
    Ok(headers)
}
