use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Compact UTC form used in entry metadata and chunk names.
pub const UTC_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Wall-clock time of a logged event, in whole seconds since the UNIX epoch.
///
/// Timestamps are expected to be non-decreasing within one stream but this
/// is not enforced.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    /// Seconds since the UNIX epoch.
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// Convert to a chrono UTC datetime, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.0).ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Format as `YYYYMMDD-HHMMSS` in UTC.
    pub fn to_utc_string(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.format(UTC_FORMAT).to_string(),
            None => format!("@{}", self.0),
        }
    }

    /// Parse a `YYYYMMDD-HHMMSS` UTC string.
    pub fn parse_utc(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: String| TypeError::InvalidTimestamp {
            input: s.to_string(),
            reason,
        };
        let naive =
            NaiveDateTime::parse_from_str(s, UTC_FORMAT).map_err(|e| invalid(e.to_string()))?;
        let secs = naive.and_utc().timestamp();
        u64::try_from(secs)
            .map(Self)
            .map_err(|_| invalid("before the UNIX epoch".into()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(u64::try_from(dt.timestamp()).unwrap_or(0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_utc_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_utc_string())
    }
}
