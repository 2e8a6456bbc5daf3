use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::NodeId;
use crate::key::ContentKey;
use crate::temporal::Timestamp;

/// Marker opening the chain header line of a rotated chunk.
pub const CHAIN_MARKER: &str = "#ftlog-chain";

/// A fault-tolerant log entry.
///
/// Describes one logged event: at `timestamp`, the node `owner` recorded
/// that `src` was responsible for the `length`-byte content addressed by
/// `key`, stored at `path`. The same record, placed first in a rotated
/// chunk, links that chunk to its predecessor (see [`LogEntry::to_chain_header`]).
///
/// Entries are validated on construction and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLogEntry")]
pub struct LogEntry {
    timestamp: Timestamp,
    key: ContentKey,
    owner: NodeId,
    length: u32,
    src: NodeId,
    path: String,
}

impl LogEntry {
    pub fn new(
        timestamp: Timestamp,
        key: ContentKey,
        owner: NodeId,
        length: u32,
        src: NodeId,
        path: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let path = path.into();
        if src.width() != owner.width() {
            return Err(TypeError::InvalidEntry {
                field: "src",
                reason: format!(
                    "width {} differs from owner width {}",
                    src.width().byte_len(),
                    owner.width().byte_len()
                ),
            });
        }
        validate_path(&path)?;
        Ok(Self {
            timestamp,
            key,
            owner,
            length,
            src,
            path,
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Content key of the file (or sealed chunk) concerned.
    pub fn key(&self) -> &ContentKey {
        &self.key
    }

    /// Who is doing the logging.
    pub fn owner(&self) -> &NodeId {
        &self.owner
    }

    /// Length of the addressed content, in octets.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Who is responsible for the content.
    pub fn src(&self) -> &NodeId {
        &self.src
    }

    /// Relative POSIX path of the content.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Single-line text form, without a trailing newline.
    ///
    /// `{secs} {key} {owner} {length} {src} {path}`; the path comes last so
    /// it may contain spaces.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.timestamp.as_secs(),
            self.key.to_hex(),
            self.owner.to_hex(),
            self.length,
            self.src.to_hex(),
            self.path
        )
    }

    /// Parse the output of [`LogEntry::to_line`].
    pub fn parse_line(line: &str) -> Result<Self, TypeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut parts = line.splitn(6, ' ');
        let mut next = |field: &'static str| {
            parts
                .next()
                .ok_or_else(|| TypeError::Malformed(format!("missing field `{field}`")))
        };

        let secs = next("timestamp")?;
        let key = next("key")?;
        let owner = next("owner")?;
        let length = next("length")?;
        let src = next("src")?;
        let path = next("path")?;

        let secs: u64 = secs
            .parse()
            .map_err(|_| TypeError::Malformed(format!("bad timestamp {secs:?}")))?;
        let length: u32 = length
            .parse()
            .map_err(|_| TypeError::Malformed(format!("bad length {length:?}")))?;

        Self::new(
            Timestamp::from_secs(secs),
            ContentKey::from_hex(key)?,
            NodeId::from_hex(owner)?,
            length,
            NodeId::from_hex(src)?,
            path,
        )
    }

    /// Chain header line for the first record of a rotated chunk.
    ///
    /// `#ftlog-chain {line} {crc32:08x}\n`. The CRC covers `{line}` so a
    /// header torn by a crash is rejected rather than misread.
    pub fn to_chain_header(&self) -> String {
        let line = self.to_line();
        let crc = crc32fast::hash(line.as_bytes());
        format!("{CHAIN_MARKER} {line} {crc:08x}\n")
    }

    /// Parse a chain header from the start of `chunk`.
    ///
    /// Returns the entry and the number of bytes the header occupies.
    /// `Ok(None)` means the chunk does not begin with a chain header.
    pub fn parse_chain_header(chunk: &[u8]) -> Result<Option<(Self, usize)>, TypeError> {
        let marker = CHAIN_MARKER.as_bytes();
        if !chunk.starts_with(marker) {
            return Ok(None);
        }
        let end = chunk
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| TypeError::Malformed("unterminated chain header".into()))?;
        let text = std::str::from_utf8(&chunk[..end])
            .map_err(|e| TypeError::Malformed(e.to_string()))?;

        let body = text
            .strip_prefix(CHAIN_MARKER)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| TypeError::Malformed("chain marker not followed by a space".into()))?;
        let (line, crc_hex) = body
            .rsplit_once(' ')
            .ok_or_else(|| TypeError::Malformed("chain header has no checksum".into()))?;
        let expected = u32::from_str_radix(crc_hex, 16)
            .map_err(|_| TypeError::Malformed(format!("bad checksum {crc_hex:?}")))?;
        let actual = crc32fast::hash(line.as_bytes());
        if actual != expected {
            return Err(TypeError::ChecksumMismatch { expected, actual });
        }

        Ok(Some((Self::parse_line(line)?, end + 1)))
    }
}

/// Unchecked wire form; deserialization goes through [`LogEntry::new`].
#[derive(Deserialize)]
struct RawLogEntry {
    timestamp: Timestamp,
    key: ContentKey,
    owner: NodeId,
    length: u32,
    src: NodeId,
    path: String,
}

impl TryFrom<RawLogEntry> for LogEntry {
    type Error = TypeError;

    fn try_from(raw: RawLogEntry) -> Result<Self, TypeError> {
        Self::new(raw.timestamp, raw.key, raw.owner, raw.length, raw.src, raw.path)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

fn validate_path(path: &str) -> Result<(), TypeError> {
    let reason = if path.is_empty() {
        "must not be empty"
    } else if path.starts_with('/') {
        "must be relative"
    } else if path.contains(['\n', '\r']) {
        "must not contain line breaks"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidEntry {
        field: "path",
        reason: reason.into(),
    })
}
