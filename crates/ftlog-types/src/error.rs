use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected 20 or 32, got {0}")]
    InvalidLength(usize),

    #[error("invalid UTC timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    #[error("invalid log entry field `{field}`: {reason}")]
    InvalidEntry { field: &'static str, reason: String },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("chain header checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}
