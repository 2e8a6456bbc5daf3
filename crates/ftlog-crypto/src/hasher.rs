use ftlog_types::{ContentKey, KeyWidth, LogEntry, NodeId, Timestamp, TypeError};

/// BLAKE3 content hasher producing keys of a fixed width.
///
/// Full-width keys are the plain 32-byte BLAKE3 digest. Short keys are the
/// first 20 bytes of the BLAKE3 extendable output, so a short key is always
/// a prefix of the full key for the same content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    width: KeyWidth,
}

impl ContentHasher {
    /// Hasher for 20-byte keys.
    pub const SHORT: Self = Self {
        width: KeyWidth::Short,
    };
    /// Hasher for 32-byte keys.
    pub const FULL: Self = Self {
        width: KeyWidth::Full,
    };

    pub const fn new(width: KeyWidth) -> Self {
        Self { width }
    }

    /// The hasher that produced (or would produce) `key`.
    pub fn for_key(key: &ContentKey) -> Self {
        Self::new(key.width())
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> ContentKey {
        match self.width {
            KeyWidth::Full => ContentKey::from_hash(*blake3::hash(data).as_bytes()),
            KeyWidth::Short => {
                let mut out = [0u8; 20];
                let mut hasher = blake3::Hasher::new();
                hasher.update(data);
                hasher.finalize_xof().fill(&mut out);
                ContentKey::from(out)
            }
        }
    }

    /// Verify that data produces the expected key.
    pub fn verify(&self, data: &[u8], expected: &ContentKey) -> bool {
        self.width == expected.width() && self.hash(data) == *expected
    }

    pub fn width(&self) -> KeyWidth {
        self.width
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::FULL
    }
}

/// Build a [`LogEntry`] describing `content`.
///
/// The key and length are computed from the content so the two can never
/// disagree. Content longer than `u32::MAX` bytes cannot be described.
pub fn entry_for_content(
    hasher: ContentHasher,
    timestamp: Timestamp,
    content: &[u8],
    owner: NodeId,
    src: NodeId,
    path: &str,
) -> Result<LogEntry, TypeError> {
    let length = u32::try_from(content.len()).map_err(|_| TypeError::InvalidEntry {
        field: "length",
        reason: format!("{} bytes exceeds u32", content.len()),
    })?;
    LogEntry::new(timestamp, hasher.hash(content), owner, length, src, path)
}

/// Whether `entry` correctly describes `content` (key and length).
pub fn verify_entry_content(entry: &LogEntry, content: &[u8]) -> bool {
    entry.length() as usize == content.len()
        && ContentHasher::for_key(entry.key()).verify(content, entry.key())
}
