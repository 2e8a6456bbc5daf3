use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use ftlog_crypto::ContentHasher;
use ftlog_types::LogEntry;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::buffer::LogBuffer;
use crate::clock::Clock;
use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::event_loop::{ack_channel, wait_ack, EventLoop, ShutdownSignal};
use crate::rotation::RotationMeta;
use crate::writer::{LogWriter, WriteRequest, WriterSettings, WriterStatus};

/// Format of the timestamp that prefixes every line.
pub const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

struct LogState {
    buffer: LogBuffer,
    entry_count: u64,
    closed: bool,
}

/// State shared between a log handle and its flush timer.
struct LogShared {
    name: String,
    state: Mutex<LogState>,
    requests: mpsc::UnboundedSender<WriteRequest>,
    status: Arc<WriterStatus>,
}

impl LogShared {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().expect("log state mutex poisoned")
    }

    /// Fails unless `state` may accept more work.
    fn check_open(&self, state: &LogState) -> Result<()> {
        if state.closed {
            return Err(LogError::Closed(self.name.clone()));
        }
        if let Some(reason) = self.status.failure() {
            return Err(LogError::Unusable {
                name: self.name.clone(),
                reason,
            });
        }
        if self.requests.is_closed() {
            return Err(LogError::EventLoopStopped);
        }
        Ok(())
    }

    /// Queue a request. Callers hold the state lock so that pages reach
    /// the writer in the order they were taken from the buffer.
    fn send(&self, _state: &LogState, request: WriteRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| LogError::EventLoopStopped)
    }

    /// Hand any buffered bytes to the writer without waiting.
    fn flush_pending(&self) -> Result<()> {
        let mut state = self.lock();
        self.check_open(&state)?;
        if state.buffer.is_empty() {
            return Ok(());
        }
        let bytes = state.buffer.take();
        self.send(&state, WriteRequest::Write { bytes, ack: None })
    }
}

/// One open log.
///
/// Lines are formatted and buffered on the caller's thread; the event loop
/// writes them to disk, either once the buffer reaches its page size or when
/// the flush timer fires. Every method takes `&self`, so a log may be shared
/// between threads behind an `Arc`.
pub struct ActualLog {
    shared: Arc<LogShared>,
    path: PathBuf,
    clock: Arc<dyn Clock>,
    flush_timeout: Option<Duration>,
}

impl ActualLog {
    /// Attach an already opened file to `event_loop`.
    pub(crate) fn attach(
        base_name: &str,
        path: PathBuf,
        file: std::fs::File,
        config: &LogConfig,
        clock: Arc<dyn Clock>,
        event_loop: &EventLoop,
        chunk_seq: u64,
    ) -> Result<Self> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let chunk_bytes = file.metadata()?.len();
        let (requests, inbox) = mpsc::unbounded_channel();
        let status = Arc::new(WriterStatus::default());

        let writer = LogWriter::new(
            base_name.to_string(),
            dir,
            file,
            inbox,
            Arc::clone(&status),
            WriterSettings {
                sync_mode: config.sync_mode,
                hasher: ContentHasher::new(config.key_width),
                rotation: config.rotation.clone(),
                clock: Arc::clone(&clock),
            },
            chunk_seq,
            chunk_bytes,
        );
        event_loop.spawn(move |shutdown| writer.run(shutdown))?;

        let shared = Arc::new(LogShared {
            name: base_name.to_string(),
            state: Mutex::new(LogState {
                buffer: LogBuffer::new(config.page_size),
                entry_count: 0,
                closed: false,
            }),
            requests,
            status,
        });

        if let Some(period) = config.flush_interval() {
            let timer = Arc::downgrade(&shared);
            event_loop.spawn(move |shutdown| flush_timer(timer, period, shutdown))?;
        }

        info!(log = %base_name, path = %path.display(), "log opened");
        Ok(Self {
            shared,
            path,
            clock,
            flush_timeout: config.flush_timeout(),
        })
    }

    /// Append one message and return the exact line buffered for it.
    ///
    /// The line is the current time, a space, the message, and a newline.
    /// Messages containing line breaks are rejected.
    pub fn log(&self, message: &str) -> Result<String> {
        if message.contains(['\n', '\r']) {
            return Err(LogError::InvalidMessage("message contains a line break"));
        }
        let line = format!("{} {message}\n", self.clock.now().format(LINE_TIME_FORMAT));

        let mut state = self.shared.lock();
        self.shared.check_open(&state)?;
        if state.buffer.append(line.as_bytes()) {
            let bytes = state.buffer.take();
            self.shared
                .send(&state, WriteRequest::Write { bytes, ack: None })?;
        }
        state.entry_count += 1;
        Ok(line)
    }

    /// Append the text form of a chain entry.
    pub fn log_entry(&self, entry: &LogEntry) -> Result<String> {
        self.log(&entry.to_line())
    }

    /// Write out everything logged so far and wait until it is on disk
    /// (or in the OS cache, depending on the sync mode).
    pub fn flush(&self) -> Result<()> {
        let rx = {
            let mut state = self.shared.lock();
            self.shared.check_open(&state)?;
            let bytes = state.buffer.take();
            let (ack, rx) = ack_channel();
            self.shared.send(
                &state,
                WriteRequest::Write {
                    bytes,
                    ack: Some(ack),
                },
            )?;
            rx
        };
        wait_ack(rx, &self.shared.name, self.flush_timeout)
    }

    /// Seal the current chunk and continue in a fresh one.
    ///
    /// Everything logged before the call lands in the sealed chunk. Returns
    /// the chain header written at the top of the new chunk.
    pub fn rotate(&self, meta: RotationMeta) -> Result<LogEntry> {
        let rx = {
            let mut state = self.shared.lock();
            self.shared.check_open(&state)?;
            let bytes = state.buffer.take();
            if !bytes.is_empty() {
                self.shared
                    .send(&state, WriteRequest::Write { bytes, ack: None })?;
            }
            let (ack, rx) = ack_channel();
            self.shared.send(&state, WriteRequest::Rotate { meta, ack })?;
            rx
        };
        wait_ack(rx, &self.shared.name, self.flush_timeout)
    }

    /// Flush, sync, and release the file. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        match self.begin_close()? {
            Some(rx) => wait_ack(rx, &self.shared.name, self.flush_timeout),
            None => Ok(()),
        }
    }

    /// Queue the final flush and close; `None` if already closed.
    pub(crate) fn begin_close(&self) -> Result<Option<std_mpsc::Receiver<Result<()>>>> {
        let mut state = self.shared.lock();
        if state.closed {
            return Ok(None);
        }
        state.closed = true;

        let bytes = state.buffer.take();
        if !bytes.is_empty() {
            self.shared
                .send(&state, WriteRequest::Write { bytes, ack: None })?;
        }
        let (ack, rx) = ack_channel();
        self.shared.send(&state, WriteRequest::Close { ack })?;
        debug!(log = %self.shared.name, entries = state.entry_count, "log closing");
        Ok(Some(rx))
    }

    pub(crate) fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout
    }

    pub fn base_name(&self) -> &str {
        &self.shared.name
    }

    /// Path of the active log file.
    pub fn log_file_name(&self) -> &Path {
        &self.path
    }

    /// Number of messages accepted so far.
    pub fn entry_count(&self) -> u64 {
        self.shared.lock().entry_count
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Bytes logged but not yet handed to the writer.
    pub fn pending_bytes(&self) -> usize {
        self.shared.lock().buffer.len()
    }
}

impl std::fmt::Debug for ActualLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActualLog")
            .field("name", &self.shared.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

async fn flush_timer(shared: Weak<LogShared>, period: Duration, mut shutdown: ShutdownSignal) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = shutdown.wait() => return,
        }
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.flush_pending().is_err() {
            return;
        }
    }
}
