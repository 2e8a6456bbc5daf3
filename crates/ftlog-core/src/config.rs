use std::path::{Path, PathBuf};
use std::time::Duration;

use ftlog_types::{KeyWidth, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Default page size in bytes. Deliberately small so the capacity flush
/// path runs constantly.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Default interval between timed flushes of a non-empty buffer.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

/// Flush/sync strategy for log files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every flush (safest, highest latency).
    EveryFlush,
    /// Rely on OS page-cache buffering; `fsync` only on close and rotation.
    #[default]
    OsDefault,
}

/// Size-triggered rotation of a log into chained chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Seal the current chunk once it holds at least this many bytes.
    pub max_chunk_bytes: u64,
    /// Node recorded as owner of the chain header.
    pub owner: NodeId,
    /// Identity recorded as source of the chain header.
    pub src: NodeId,
}

/// Per-log buffering and flush settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Buffer size at which a flush is scheduled.
    pub page_size: usize,
    /// Timed flush interval in milliseconds; 0 disables timed flushes.
    pub flush_interval_ms: u64,
    /// How long `flush`/`close` wait for the writer; `None` waits forever.
    pub flush_timeout_ms: Option<u64>,
    pub sync_mode: SyncMode,
    /// Width of chunk keys written into chain headers.
    pub key_width: KeyWidth,
    pub rotation: Option<RotationPolicy>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            flush_timeout_ms: None,
            sync_mode: SyncMode::default(),
            key_width: KeyWidth::default(),
            rotation: None,
        }
    }
}

impl LogConfig {
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }

    pub fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(LogError::Config("page_size must be at least 1".into()));
        }
        if self.flush_timeout_ms == Some(0) {
            return Err(LogError::Config(
                "flush_timeout_ms must be at least 1 (omit it to wait forever)".into(),
            ));
        }
        if let Some(rotation) = &self.rotation {
            if rotation.max_chunk_bytes == 0 || rotation.max_chunk_bytes > u64::from(u32::MAX / 2) {
                return Err(LogError::Config(
                    "rotation.max_chunk_bytes must be between 1 and 2 GiB".into(),
                ));
            }
            if rotation.owner.width() != rotation.src.width() {
                return Err(LogError::Config(
                    "rotation.owner and rotation.src must have the same width".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for a [`LogMgr`](crate::LogMgr).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMgrConfig {
    /// Directory holding every log this manager owns.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogMgrConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log: LogConfig::default(),
        }
    }
}

impl LogMgrConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| LogError::Config(e.to_string()))?;
        config.log.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LogError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LogMgrConfig::default();
        assert_eq!(c.log_dir, PathBuf::from("logs"));
        assert_eq!(c.log.page_size, 64);
        assert_eq!(c.log.flush_interval(), Some(Duration::from_millis(100)));
        assert_eq!(c.log.flush_timeout(), None);
        assert_eq!(c.log.sync_mode, SyncMode::OsDefault);
        assert!(c.log.rotation.is_none());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(LogMgrConfig::from_toml_str("").unwrap(), LogMgrConfig::default());
    }

    #[test]
    fn toml_overrides() {
        let owner = NodeId::derive("node-a");
        let src = NodeId::derive("alice");
        let text = format!(
            r#"
            log_dir = "/var/log/ftlog"

            [log]
            page_size = 4096
            flush_interval_ms = 0
            flush_timeout_ms = 2500
            sync_mode = "every_flush"
            key_width = "short"

            [log.rotation]
            max_chunk_bytes = 1048576
            owner = "{owner}"
            src = "{src}"
            "#
        );
        let c = LogMgrConfig::from_toml_str(&text).unwrap();
        assert_eq!(c.log_dir, PathBuf::from("/var/log/ftlog"));
        assert_eq!(c.log.page_size, 4096);
        assert_eq!(c.log.flush_interval(), None);
        assert_eq!(c.log.flush_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(c.log.sync_mode, SyncMode::EveryFlush);
        assert_eq!(c.log.key_width, KeyWidth::Short);
        let rotation = c.log.rotation.unwrap();
        assert_eq!(rotation.max_chunk_bytes, 1 << 20);
        assert_eq!(rotation.owner, owner);
        assert_eq!(rotation.src, src);
    }

    #[test]
    fn zero_page_size_rejected() {
        let err = LogMgrConfig::from_toml_str("[log]\npage_size = 0\n").unwrap_err();
        assert!(matches!(err, LogError::Config(_)));
    }

    #[test]
    fn zero_flush_timeout_rejected() {
        let err = LogMgrConfig::from_toml_str("[log]\nflush_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, LogError::Config(ref m) if m.contains("flush_timeout_ms")));
        assert!(LogMgrConfig::from_toml_str("[log]\nflush_timeout_ms = 1\n").is_ok());
    }

    #[test]
    fn bad_toml_rejected() {
        assert!(matches!(
            LogMgrConfig::from_toml_str("log_dir = ["),
            Err(LogError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftlog.toml");
        std::fs::write(&path, "log_dir = \"tmp/logs\"\n").unwrap();
        let c = LogMgrConfig::load(&path).unwrap();
        assert_eq!(c.log_dir, PathBuf::from("tmp/logs"));

        assert!(LogMgrConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
