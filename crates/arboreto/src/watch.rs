//! Filesystem watch: turns raw `notify` events into pipeline events.
//!
//! The watcher thread only translates and forwards. Everything else (settle
//! window, dispatch, shutdown) happens on the supervisor thread, which owns the
//! receiving end of the channel.

use crate::pipeline::CreatedEvent;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch root {} is not accessible: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register watch on {}: {source}", .path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// What the watcher thread sends to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// An entry appeared directly in the watch root
    Created(CreatedEvent),
    /// An entry in the watch root was written to
    Touched(PathBuf),
    /// The watch mechanism itself failed
    Failed(String),
}

/// Live registration on the watch root. Dropping it stops event delivery.
pub struct DirectoryWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Register a non-recursive watch on `root` and forward translated
    /// events to `tx`.
    pub fn start(root: &Path, tx: Sender<WatchSignal>) -> Result<Self, WatchError> {
        let root = root.canonicalize().map_err(|source| WatchError::Root {
            path: root.to_path_buf(),
            source,
        })?;

        let filter_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let signals = match res {
                Ok(event) => translate(&filter_root, &event),
                Err(err) => vec![WatchSignal::Failed(err.to_string())],
            };
            for signal in signals {
                // receiver gone means the supervisor is stopping
                if tx.send(signal).is_err() {
                    break;
                }
            }
        })
        .map_err(|source| WatchError::Register {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: root.clone(),
                source,
            })?;

        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    /// Canonical path being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map one `notify` event onto zero or more signals for paths directly
/// inside `root`.
pub fn translate(root: &Path, event: &Event) -> Vec<WatchSignal> {
    let paths: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other)
        | EventKind::Create(CreateKind::Folder)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
            event.paths.iter().collect()
        }
        // [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last().into_iter().collect(),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            return event
                .paths
                .iter()
                .filter(|path| is_direct_child(root, path))
                .map(|path| WatchSignal::Touched(path.clone()))
                .collect();
        }
        _ => return Vec::new(),
    };

    let is_dir = matches!(event.kind, EventKind::Create(CreateKind::Folder));
    paths
        .into_iter()
        .filter(|path| {
            let keep = is_direct_child(root, path);
            if !keep {
                debug!(path = %path.display(), "Event outside the watch root dropped");
            }
            keep
        })
        .map(|path| {
            WatchSignal::Created(CreatedEvent {
                path: path.clone(),
                is_dir,
            })
        })
        .collect()
}

fn is_direct_child(root: &Path, path: &Path) -> bool {
    path.parent() == Some(root)
}

#[derive(Debug)]
struct Pending {
    last_seen: Instant,
    is_dir: bool,
}

/// Detected paths waiting for their settle window to pass.
///
/// A path is released once nothing touched it for `settle`. Repeated
/// creation events for a path that is still pending collapse into one.
#[derive(Debug)]
pub struct PendingSet {
    settle: Duration,
    entries: HashMap<PathBuf, Pending>,
}

impl PendingSet {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            entries: HashMap::new(),
        }
    }

    pub fn note_created(&mut self, event: CreatedEvent, now: Instant) {
        let entry = self.entries.entry(event.path).or_insert(Pending {
            last_seen: now,
            is_dir: event.is_dir,
        });
        entry.last_seen = now;
        entry.is_dir |= event.is_dir;
    }

    /// Extend the window of a pending path. Unknown paths are ignored.
    pub fn touch(&mut self, path: &Path, now: Instant) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.last_seen = now;
        }
    }

    /// Remove and return every path whose window has passed, in path order.
    pub fn drain_settled(&mut self, now: Instant) -> Vec<CreatedEvent> {
        let settle = self.settle;
        let mut ready: Vec<CreatedEvent> = self
            .entries
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.last_seen) >= settle)
            .map(|(path, pending)| CreatedEvent {
                path: path.clone(),
                is_dir: pending.is_dir,
            })
            .collect();
        for event in &ready {
            self.entries.remove(&event.path);
        }
        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    /// Drop everything still pending, returning the paths.
    pub fn discard(&mut self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.drain().map(|(path, _)| path).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
