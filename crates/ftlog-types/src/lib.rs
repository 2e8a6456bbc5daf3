//! Foundation types for ftlog, the fault-tolerant append-only log store.
//!
//! Every other ftlog crate depends on `ftlog-types`.
//!
//! # Key Types
//!
//! - [`ContentKey`]: 20- or 32-byte content digest
//! - [`NodeId`]: identity of the owner or source of an entry
//! - [`Timestamp`]: whole-second UTC time with `YYYYMMDD-HHMMSS` formatting
//! - [`LogEntry`]: immutable record of one logged event, also used as the
//!   header that chains a rotated chunk to its predecessor

pub mod entry;
pub mod error;
pub mod identity;
pub mod key;
pub mod temporal;

pub use entry::{LogEntry, CHAIN_MARKER};
pub use error::TypeError;
pub use identity::NodeId;
pub use key::{ContentKey, KeyWidth};
pub use temporal::{Timestamp, UTC_FORMAT};
