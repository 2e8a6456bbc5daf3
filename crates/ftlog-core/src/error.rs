use std::io;
use std::time::Duration;

use ftlog_crypto::ChainError;
use ftlog_types::TypeError;

/// Errors produced by the log manager and its logs.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// I/O error creating, writing, syncing, or rotating a log file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// `open` was called for a base name that is already open.
    #[error("log named {0:?} already exists")]
    DuplicateLog(String),

    /// No open log has this base name.
    #[error("no open log named {0:?}")]
    UnknownLog(String),

    /// The base name cannot be turned into a file name.
    #[error("invalid log name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A log entry failed validation and was not written.
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] TypeError),

    /// A chunk chain on disk does not verify.
    #[error("chain verification failed: {0}")]
    Chain(#[from] ChainError),

    /// The message would break line framing.
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    /// The log has been closed; nothing more may be written to it.
    #[error("log {0:?} is closed")]
    Closed(String),

    /// An earlier write failed; the log accepts no further entries.
    #[error("log {name:?} is unusable after a failed write: {reason}")]
    Unusable { name: String, reason: String },

    /// A flush or close did not complete within the configured timeout.
    #[error("flush of log {name:?} did not complete within {after:?}")]
    FlushTimeout { name: String, after: Duration },

    /// The event loop has stopped and can no longer service writes.
    #[error("event loop is not running")]
    EventLoopStopped,

    /// Closing the manager failed for one or more logs. Every log was
    /// still attempted.
    #[error("failed to close {} log(s): {}", .failures.len(), summarize(.failures))]
    Close { failures: Vec<(String, LogError)> },

    /// Configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

fn summarize(failures: &[(String, LogError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, LogError>;
