use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{LogConfig, LogMgrConfig};
use crate::error::{LogError, Result};
use crate::event_loop::{wait_ack, EventLoop};
use crate::log::ActualLog;
use crate::rotation::{active_file_name, latest_chunk_seq};

/// Registry of the open logs of one log directory.
///
/// Each base name maps to at most one [`ActualLog`]. All logs share one
/// [`EventLoop`], which the manager either owns or borrows.
pub struct LogMgr {
    config: LogMgrConfig,
    log_map: Mutex<HashMap<String, Arc<ActualLog>>>,
    event_loop: Arc<EventLoop>,
    clock: Arc<dyn Clock>,
}

impl LogMgr {
    /// A manager for `log_dir` with default settings and its own loop.
    pub fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(LogMgrConfig::new(log_dir.as_ref()))
    }

    /// A manager with its own event loop and the system clock.
    pub fn with_config(config: LogMgrConfig) -> Result<Self> {
        let event_loop = Arc::new(EventLoop::start()?);
        Self::with_event_loop(config, event_loop, Arc::new(SystemClock))
    }

    /// A manager sharing an existing event loop.
    pub fn with_event_loop(
        config: LogMgrConfig,
        event_loop: Arc<EventLoop>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.log.validate()?;
        Ok(Self {
            config,
            log_map: Mutex::new(HashMap::new()),
            event_loop,
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ActualLog>>> {
        self.log_map.lock().expect("log map mutex poisoned")
    }

    /// Open a new log named `base_name`, writing to `{log_dir}/{base_name}.log`.
    ///
    /// The file and any missing parent directories are created at once, so
    /// the file exists even if nothing is ever logged. Existing content is
    /// kept and appended to. Fails with [`LogError::DuplicateLog`] if the
    /// name is already open, leaving the open log untouched.
    pub fn open(&self, base_name: &str) -> Result<Arc<ActualLog>> {
        validate_name(base_name)?;

        let mut log_map = self.lock();
        if log_map.contains_key(base_name) {
            return Err(LogError::DuplicateLog(base_name.to_string()));
        }

        let dir = &self.config.log_dir;
        fs::create_dir_all(dir)?;
        let path = dir.join(active_file_name(base_name));
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let chunk_seq = latest_chunk_seq(dir, base_name)?;

        let log = Arc::new(ActualLog::attach(
            base_name,
            path,
            file,
            &self.config.log,
            Arc::clone(&self.clock),
            &self.event_loop,
            chunk_seq,
        )?);
        log_map.insert(base_name.to_string(), Arc::clone(&log));
        Ok(log)
    }

    /// The open log named `base_name`, if any.
    pub fn get(&self, base_name: &str) -> Option<Arc<ActualLog>> {
        self.lock().get(base_name).cloned()
    }

    /// Close one log and forget it. Its name may then be opened again.
    ///
    /// The log stays registered until its writer has released the file, so
    /// an `open` of the same name meanwhile fails with
    /// [`LogError::DuplicateLog`].
    pub fn close_log(&self, base_name: &str) -> Result<()> {
        let log = self
            .get(base_name)
            .ok_or_else(|| LogError::UnknownLog(base_name.to_string()))?;
        let closed = log.close();
        self.forget(base_name, &log);
        closed
    }

    /// Flush and release every open log, then clear the registry.
    ///
    /// Every log is attempted even if some fail; the failures are reported
    /// together. Logs leave the registry only once their close has finished
    /// or failed. Calling `close` again with nothing open does nothing.
    /// Files are never deleted.
    pub fn close(&self) -> Result<()> {
        let mut logs: Vec<(String, Arc<ActualLog>)> = self
            .lock()
            .iter()
            .map(|(name, log)| (name.clone(), Arc::clone(log)))
            .collect();
        if logs.is_empty() {
            return Ok(());
        }
        logs.sort_by(|a, b| a.0.cmp(&b.0));

        // Queue every close first so the loop can work on all of them at once.
        let mut pending = Vec::with_capacity(logs.len());
        let mut failures = Vec::new();
        for (name, log) in &logs {
            match log.begin_close() {
                Ok(Some(rx)) => pending.push((name, log, rx)),
                Ok(None) => {}
                Err(e) => failures.push((name.clone(), e)),
            }
        }
        for (name, log, rx) in pending {
            if let Err(e) = wait_ack(rx, name, log.flush_timeout()) {
                failures.push((name.clone(), e));
            }
        }
        for (name, log) in &logs {
            self.forget(name, log);
        }

        if failures.is_empty() {
            info!(logs = logs.len(), "all logs closed");
            Ok(())
        } else {
            for (name, e) in &failures {
                warn!(log = %name, error = %e, "log failed to close");
            }
            failures.sort_by(|a, b| a.0.cmp(&b.0));
            Err(LogError::Close { failures })
        }
    }

    /// Drop `log` from the registry unless its name was reopened meanwhile.
    fn forget(&self, base_name: &str, log: &Arc<ActualLog>) {
        let mut log_map = self.lock();
        if log_map
            .get(base_name)
            .is_some_and(|current| Arc::ptr_eq(current, log))
        {
            log_map.remove(base_name);
        }
    }

    /// Close every log, then stop the event loop.
    ///
    /// The loop is shared with anyone else holding it; they will find it
    /// stopped.
    pub fn shutdown(self) -> Result<()> {
        let closed = self.close();
        self.event_loop.shutdown()?;
        closed
    }

    pub fn log_dir(&self) -> &Path {
        &self.config.log_dir
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.config.log
    }

    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    /// Base names of the open logs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Drop for LogMgr {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "closing logs on drop failed");
        }
    }
}

/// Reject base names that cannot be used as a file name, or that would
/// collide with a sealed chunk of another log.
fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name contains a path separator")
    } else if name.contains(['\n', '\r']) {
        Some("name contains a line break")
    } else if looks_like_chunk(name) {
        Some("name ends like a sealed chunk number")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(LogError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn looks_like_chunk(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, tail)| tail.len() >= 6 && tail.bytes().all(|b| b.is_ascii_digit()))
}
