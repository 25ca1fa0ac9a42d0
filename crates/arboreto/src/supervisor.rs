//! Process supervisor.
//!
//! Owns the watch lifecycle:
//!
//! ```text
//! STOPPED → STARTING → RUNNING → STOPPING → STOPPED
//! ```
//!
//! STARTING bootstraps folders and registers the watch; either failing is
//! fatal. RUNNING waits on the event channel and dispatches settled paths to
//! the handler one at a time. A shutdown request, or a failure of the watch
//! mechanism itself, moves to STOPPING.

use crate::bootstrap::{ensure_folders, BootstrapError};
use crate::pipeline::FileEventHandler;
use crate::shutdown::ShutdownToken;
use crate::stats::PipelineStats;
use crate::watch::{DirectoryWatcher, PendingSet, WatchError, WatchSignal};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const DEFAULT_SETTLE: Duration = Duration::from_millis(250);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Watch mechanism failed: {0}")]
    WatchFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SupervisorState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl SupervisorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SupervisorState::Starting,
            2 => SupervisorState::Running,
            3 => SupervisorState::Stopping,
            _ => SupervisorState::Stopped,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Stopped => "STOPPED",
            SupervisorState::Starting => "STARTING",
            SupervisorState::Running => "RUNNING",
            SupervisorState::Stopping => "STOPPING",
        };
        f.write_str(name)
    }
}

/// Shared view of the supervisor's current state.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    state: Arc<AtomicU8>,
}

impl StateHandle {
    pub fn get(&self) -> SupervisorState {
        SupervisorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, next: SupervisorState) {
        let prev = SupervisorState::from_u8(self.state.swap(next as u8, Ordering::SeqCst));
        debug!(from = %prev, to = %next, "Supervisor state change");
    }
}

pub struct Supervisor<H> {
    handler: H,
    watch_root: PathBuf,
    folders: Vec<PathBuf>,
    settle: Duration,
    poll_interval: Duration,
    shutdown: ShutdownToken,
    state: StateHandle,
    stats: Option<Arc<PipelineStats>>,
}

impl<H: FileEventHandler> Supervisor<H> {
    pub fn new(handler: H, watch_root: impl Into<PathBuf>, shutdown: ShutdownToken) -> Self {
        let watch_root = watch_root.into();
        Self {
            handler,
            folders: vec![watch_root.clone()],
            watch_root,
            settle: DEFAULT_SETTLE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
            state: StateHandle::default(),
            stats: None,
        }
    }

    /// Folders bootstrapped during STARTING. The watch root is always added.
    pub fn with_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.folders = folders;
        if !self.folders.contains(&self.watch_root) {
            self.folders.insert(0, self.watch_root.clone());
        }
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Counters summarised at shutdown.
    pub fn with_stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Run until shutdown is requested or the watch fails.
    pub fn run(self) -> Result<(), SupervisorError> {
        self.state.set(SupervisorState::Starting);
        let (watcher, rx) = match self.start() {
            Ok(started) => started,
            Err(err) => {
                error!(error = %err, "Startup failed");
                self.state.set(SupervisorState::Stopped);
                return Err(err);
            }
        };

        info!(path = %watcher.root().display(), "Watching for new records");
        self.drive(rx, watcher)
    }

    /// RUNNING and STOPPING over an already registered event channel.
    ///
    /// `registration` keeps events flowing while held and is dropped on entry
    /// to STOPPING.
    pub(crate) fn drive<W>(
        &self,
        rx: mpsc::Receiver<WatchSignal>,
        registration: W,
    ) -> Result<(), SupervisorError> {
        self.state.set(SupervisorState::Running);

        let mut pending = PendingSet::new(self.settle);
        let result = loop {
            if self.shutdown.is_requested() {
                break Ok(());
            }

            match rx.recv_timeout(self.poll_interval) {
                Ok(WatchSignal::Created(event)) => {
                    debug!(path = %event.path.display(), "Creation event");
                    pending.note_created(event, Instant::now());
                }
                Ok(WatchSignal::Touched(path)) => pending.touch(&path, Instant::now()),
                Ok(WatchSignal::Failed(reason)) => {
                    error!(%reason, "Watch mechanism failed, shutting down");
                    break Err(SupervisorError::WatchFailed(reason));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Watch event channel closed, shutting down");
                    break Err(SupervisorError::WatchFailed(
                        "event channel closed".to_string(),
                    ));
                }
            }

            for event in pending.drain_settled(Instant::now()) {
                // rename notifications can name the old path of a file already moved away
                if fs::symlink_metadata(&event.path).is_err() {
                    debug!(path = %event.path.display(), "Settled path no longer exists, skipping");
                    continue;
                }
                self.handler.on_file_created(&event);
            }
        };

        self.state.set(SupervisorState::Stopping);
        info!("Stopping watch");
        drop(registration);
        drop(rx);

        for path in pending.discard() {
            warn!(path = %path.display(), "Pending file not processed before shutdown");
        }
        if let Some(stats) = &self.stats {
            info!(stats = %stats.snapshot(), "Pipeline summary");
        }

        self.state.set(SupervisorState::Stopped);
        info!("Stopped");
        result
    }

    fn start(&self) -> Result<(DirectoryWatcher, mpsc::Receiver<WatchSignal>), SupervisorError> {
        ensure_folders(&self.folders)?;
        let (tx, rx) = mpsc::channel();
        let watcher = DirectoryWatcher::start(&self.watch_root, tx)?;
        Ok((watcher, rx))
    }
}
