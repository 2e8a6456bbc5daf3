use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Width of a content key or node identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyWidth {
    /// 20-byte digest.
    Short,
    /// 32-byte digest.
    #[default]
    Full,
}

impl KeyWidth {
    /// Number of bytes for this width.
    pub const fn byte_len(self) -> usize {
        match self {
            Self::Short => 20,
            Self::Full => 32,
        }
    }

    /// Width for a byte length, if it is one of the two supported lengths.
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            20 => Some(Self::Short),
            32 => Some(Self::Full),
            _ => None,
        }
    }
}

/// Copy a 20- or 32-byte slice into a zero-padded 32-byte array.
pub(crate) fn fixed_bytes(bytes: &[u8]) -> Result<(KeyWidth, [u8; 32]), TypeError> {
    let width = KeyWidth::from_len(bytes.len()).ok_or(TypeError::InvalidLength(bytes.len()))?;
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(bytes);
    Ok((width, arr))
}

pub(crate) fn fixed_bytes_from_hex(s: &str) -> Result<(KeyWidth, [u8; 32]), TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    fixed_bytes(&bytes)
}

/// Content-addressed key for a block of logged content.
///
/// A `ContentKey` is a 20- or 32-byte digest produced by a content hasher.
/// Identical content hashed at the same width always yields the same key.
/// Keys of different widths never compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    width: KeyWidth,
    bytes: [u8; 32],
}

impl ContentKey {
    /// Build a key from a 20- or 32-byte digest.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let (width, bytes) = fixed_bytes(bytes)?;
        Ok(Self { width, bytes })
    }

    /// Build a full-width key from a pre-computed 32-byte hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self {
            width: KeyWidth::Full,
            bytes: hash,
        }
    }

    /// Parse from a 40- or 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let (width, bytes) = fixed_bytes_from_hex(s)?;
        Ok(Self { width, bytes })
    }

    /// The key width.
    pub fn width(&self) -> KeyWidth {
        self.width
    }

    /// The digest bytes (20 or 32 of them).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width.byte_len()]
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.bytes[..4])
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.short_hex())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ContentKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self::from_hash(bytes)
    }
}

impl From<[u8; 20]> for ContentKey {
    fn from(bytes: [u8; 20]) -> Self {
        let mut arr = [0u8; 32];
        arr[..20].copy_from_slice(&bytes);
        Self {
            width: KeyWidth::Short,
            bytes: arr,
        }
    }
}

impl Serialize for ContentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
