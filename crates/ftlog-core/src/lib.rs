//! Buffered append-only logs for ftlog.
//!
//! A [`LogMgr`] owns a directory of named logs. Each [`ActualLog`] formats
//! messages into timestamped lines, stages them in a page-sized buffer, and
//! hands full pages to a single cooperative [`EventLoop`] that performs all
//! file I/O. Logs can be rotated into chunks that chain to each other by
//! content key, so a sealed chunk can later be checked against the header of
//! its successor.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod log;
pub mod manager;
pub mod rotation;
mod writer;

pub use buffer::LogBuffer;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LogConfig, LogMgrConfig, RotationPolicy, SyncMode};
pub use error::{LogError, Result};
pub use event_loop::EventLoop;
pub use log::{ActualLog, LINE_TIME_FORMAT};
pub use manager::LogMgr;
pub use rotation::{chain_files, verify_log_chain, RotationMeta};
