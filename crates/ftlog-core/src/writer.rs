use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ftlog_crypto::entry_for_content;
use ftlog_crypto::ContentHasher;
use ftlog_types::{LogEntry, Timestamp};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{RotationPolicy, SyncMode};
use crate::error::{LogError, Result};
use crate::event_loop::{Ack, ShutdownSignal};
use crate::rotation::{active_file_name, chunk_file_name, RotationMeta};

/// Work handed from a log to its writer task. Applied strictly in order.
pub(crate) enum WriteRequest {
    /// Append a page. `ack` is present for explicit flushes.
    Write { bytes: Vec<u8>, ack: Option<Ack<()>> },
    /// Seal the active chunk and start a new one.
    Rotate {
        meta: RotationMeta,
        ack: Ack<LogEntry>,
    },
    /// Sync and release the file.
    Close { ack: Ack<()> },
}

/// First write failure of a log, shared between the log and its writer.
#[derive(Debug, Default)]
pub(crate) struct WriterStatus {
    failure: Mutex<Option<String>>,
}

impl WriterStatus {
    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().expect("writer status mutex poisoned").clone()
    }

    fn record(&self, error: &LogError) {
        let mut failure = self.failure.lock().expect("writer status mutex poisoned");
        if failure.is_none() {
            *failure = Some(error.to_string());
        }
    }
}

/// Settings the writer needs from the log's configuration.
pub(crate) struct WriterSettings {
    pub sync_mode: SyncMode,
    pub hasher: ContentHasher,
    pub rotation: Option<RotationPolicy>,
    pub clock: Arc<dyn Clock>,
}

/// Owns one log's file on the event loop.
pub(crate) struct LogWriter {
    name: String,
    dir: PathBuf,
    file: File,
    requests: mpsc::UnboundedReceiver<WriteRequest>,
    status: Arc<WriterStatus>,
    settings: WriterSettings,
    /// Number of the most recently sealed chunk.
    chunk_seq: u64,
    /// Bytes in the active chunk.
    chunk_bytes: u64,
}

enum Flow {
    Continue,
    Stop,
}

impl LogWriter {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        dir: PathBuf,
        file: std::fs::File,
        requests: mpsc::UnboundedReceiver<WriteRequest>,
        status: Arc<WriterStatus>,
        settings: WriterSettings,
        chunk_seq: u64,
        chunk_bytes: u64,
    ) -> Self {
        Self {
            name,
            dir,
            file: File::from_std(file),
            requests,
            status,
            settings,
            chunk_seq,
            chunk_bytes,
        }
    }

    /// Serve requests until the log closes or the loop shuts down.
    ///
    /// On shutdown every request already queued is still applied, then the
    /// file is synced.
    pub(crate) async fn run(mut self, mut shutdown: ShutdownSignal) {
        loop {
            tokio::select! {
                biased;
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if let Flow::Stop = self.handle(request).await {
                            return;
                        }
                    }
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }

        while let Ok(request) = self.requests.try_recv() {
            if let Flow::Stop = self.handle(request).await {
                return;
            }
        }
        if let Err(e) = self.sync_all().await {
            warn!(log = %self.name, error = %e, "final sync failed");
        }
        debug!(log = %self.name, "writer stopped");
    }

    async fn handle(&mut self, request: WriteRequest) -> Flow {
        match request {
            WriteRequest::Write { bytes, ack } => {
                let result = self.write_page(&bytes).await;
                if let Err(e) = &result {
                    warn!(log = %self.name, error = %e, "write failed");
                }
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
                Flow::Continue
            }
            WriteRequest::Rotate { meta, ack } => {
                let result = match self.checked() {
                    Ok(()) => self.rotate(&meta).await,
                    Err(e) => Err(e),
                };
                let _ = ack.send(result);
                Flow::Continue
            }
            WriteRequest::Close { ack } => {
                let result = match self.checked() {
                    Ok(()) => self.sync_all().await,
                    Err(e) => Err(e),
                };
                debug!(log = %self.name, ok = result.is_ok(), "writer closed");
                let _ = ack.send(result);
                Flow::Stop
            }
        }
    }

    /// Fails if an earlier write already failed.
    fn checked(&self) -> Result<()> {
        match self.status.failure() {
            Some(reason) => Err(LogError::Unusable {
                name: self.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Record `result`'s error as the log's sticky failure.
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.status.record(e);
        }
        result
    }

    async fn write_page(&mut self, bytes: &[u8]) -> Result<()> {
        self.checked()?;
        let result = self.append(bytes).await;
        self.track(result)?;

        if let Some(policy) = &self.settings.rotation {
            if self.chunk_bytes >= policy.max_chunk_bytes {
                let meta = RotationMeta::from(policy);
                self.rotate(&meta).await?;
            }
        }
        Ok(())
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if !bytes.is_empty() {
            self.file.write_all(bytes).await?;
            self.file.flush().await?;
            self.chunk_bytes += bytes.len() as u64;
        }
        if self.settings.sync_mode == SyncMode::EveryFlush {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    async fn sync_all(&mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }

    async fn rotate(&mut self, meta: &RotationMeta) -> Result<LogEntry> {
        let result = self.seal_and_restart(meta).await;
        match &result {
            // A bad header leaves the file untouched; anything else may
            // have left the chain half rotated.
            Err(LogError::InvalidEntry(_)) => {}
            Err(e) => self.status.record(e),
            Ok(_) => {}
        }
        result
    }

    async fn seal_and_restart(&mut self, meta: &RotationMeta) -> Result<LogEntry> {
        self.sync_all().await?;
        let active = self.dir.join(active_file_name(&self.name));
        let sealed = tokio::fs::read(&active).await?;

        let seq = self.chunk_seq + 1;
        let sealed_name = chunk_file_name(&self.name, seq);
        let timestamp = Timestamp::from(self.settings.clock.now());
        let header = entry_for_content(
            self.settings.hasher,
            timestamp,
            &sealed,
            meta.owner,
            meta.src,
            &sealed_name,
        )?;

        tokio::fs::rename(&active, self.dir.join(&sealed_name)).await?;
        self.chunk_seq = seq;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active)
            .await?;
        self.chunk_bytes = 0;
        self.append(header.to_chain_header().as_bytes()).await?;
        self.file.sync_all().await?;

        info!(
            log = %self.name,
            chunk = %sealed_name,
            length = header.length(),
            key = %header.key().short_hex(),
            "log rotated"
        );
        Ok(header)
    }
}
