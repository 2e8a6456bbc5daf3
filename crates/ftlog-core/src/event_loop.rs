use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{LogError, Result};

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;
type TaskFactory = Box<dyn FnOnce(ShutdownSignal) -> BoxedTask + Send>;

enum LoopCommand {
    Spawn(TaskFactory),
    Stop,
}

/// Tells tasks on the loop that shutdown has begun.
///
/// Writer tasks react by draining whatever is already queued for them;
/// timers simply stop.
#[derive(Clone)]
pub(crate) struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Resolves once shutdown has begun (immediately if it already has).
    pub(crate) async fn wait(&mut self) {
        // An error means the loop handle is gone, which is also shutdown.
        let _ = self.0.wait_for(|stopping| *stopping).await;
    }
}

/// Completion slot for one request handed to the loop.
pub(crate) type Ack<T> = std_mpsc::SyncSender<Result<T>>;

pub(crate) fn ack_channel<T>() -> (Ack<T>, std_mpsc::Receiver<Result<T>>) {
    std_mpsc::sync_channel(1)
}

/// Block until the loop answers a request, or `timeout` elapses.
pub(crate) fn wait_ack<T>(
    rx: std_mpsc::Receiver<Result<T>>,
    name: &str,
    timeout: Option<Duration>,
) -> Result<T> {
    match timeout {
        None => rx.recv().map_err(|_| LogError::EventLoopStopped)?,
        Some(after) => match rx.recv_timeout(after) {
            Ok(result) => result,
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(LogError::FlushTimeout {
                name: name.to_string(),
                after,
            }),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(LogError::EventLoopStopped),
        },
    }
}

/// Single-threaded cooperative event loop shared by every log of a process.
///
/// The loop owns one OS thread running a current-thread tokio runtime.
/// Each open log gets a writer task that owns its file and applies writes
/// strictly in submission order, plus an optional flush timer. While one
/// log's write is outstanding the loop keeps servicing the others.
///
/// Construct one explicitly with [`EventLoop::start`] and share it by
/// `Arc`. [`EventLoop::shutdown`] lets every writer drain its queue before
/// the thread exits; dropping the loop does the same.
pub struct EventLoop {
    commands: mpsc::UnboundedSender<LoopCommand>,
    stopping: watch::Sender<bool>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EventLoop {
    /// Start the loop thread.
    pub fn start() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (stopping, stopping_rx) = watch::channel(false);

        let thread = thread::Builder::new()
            .name("ftlog-event-loop".into())
            .spawn(move || runtime.block_on(run(command_rx, ShutdownSignal(stopping_rx))))?;

        info!("event loop started");
        Ok(Self {
            commands,
            stopping,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Whether the loop still accepts tasks.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed() && !*self.stopping.borrow()
    }

    /// Spawn a task on the loop. The task receives the shutdown signal.
    pub(crate) fn spawn<F, Fut>(&self, task: F) -> Result<()>
    where
        F: FnOnce(ShutdownSignal) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if *self.stopping.borrow() {
            return Err(LogError::EventLoopStopped);
        }
        let factory: TaskFactory = Box::new(move |signal| Box::pin(task(signal)));
        self.commands
            .send(LoopCommand::Spawn(factory))
            .map_err(|_| LogError::EventLoopStopped)
    }

    /// Stop the loop after every task has finished its queued work.
    ///
    /// Idempotent. Blocks until the loop thread has exited.
    pub fn shutdown(&self) -> Result<()> {
        let handle = self.thread.lock().expect("event loop mutex poisoned").take();
        let Some(handle) = handle else {
            return Ok(());
        };

        self.stopping.send_replace(true);
        // The loop may already be gone if it panicked.
        let _ = self.commands.send(LoopCommand::Stop);

        handle.join().map_err(|_| {
            warn!("event loop thread panicked");
            LogError::EventLoopStopped
        })?;
        info!("event loop stopped");
        Ok(())
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "event loop shutdown failed");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<LoopCommand>, signal: ShutdownSignal) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LoopCommand::Spawn(factory)) => {
                    tasks.spawn(factory(signal.clone()));
                }
                Some(LoopCommand::Stop) | None => break,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "event loop task failed");
                }
            }
        }
    }

    // Refuse new work, then let the existing tasks drain.
    commands.close();
    debug!(outstanding = tasks.len(), "event loop draining");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "event loop task failed");
        }
    }
}
