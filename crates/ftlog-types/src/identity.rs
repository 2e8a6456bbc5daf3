use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::key::{fixed_bytes, fixed_bytes_from_hex, KeyWidth};

/// Identity of a node or person in a log entry.
///
/// Used for both the `owner` (the node doing the logging) and the `src`
/// (who is responsible for the change). Like a content key, a `NodeId` is
/// 20 or 32 bytes wide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    width: KeyWidth,
    bytes: [u8; 32],
}

impl NodeId {
    /// Derive a full-width `NodeId` from a human-readable label.
    pub fn derive(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ftlog-node-v1:");
        hasher.update(label.as_bytes());
        Self {
            width: KeyWidth::Full,
            bytes: *hasher.finalize().as_bytes(),
        }
    }

    /// Build from a 20- or 32-byte identity.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let (width, bytes) = fixed_bytes(bytes)?;
        Ok(Self { width, bytes })
    }

    /// Parse from a 40- or 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let (width, bytes) = fixed_bytes_from_hex(s)?;
        Ok(Self { width, bytes })
    }

    pub fn width(&self) -> KeyWidth {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width.byte_len()]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("node:{}", hex::encode(&self.bytes[..4]))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short_id())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
