//! Ingestion pipeline.
//!
//! One detected file goes through a fixed sequence of steps:
//!
//! ```text
//! filter → decode → validate → render → archive
//! ```
//!
//! Each step returns an explicit [`PipelineError`] on failure. A failure ends
//! processing for that file only: it is logged, the file stays in the watch
//! root, and the handler returns normally so the watch loop keeps going.

pub mod archive;
pub mod error;

use crate::stats::PipelineStats;
use arboreto_record::{parse_record, TreeRecord};
use arboreto_render::DocumentRenderer;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use archive::archive_file;
pub use error::{ArchiveError, FailureKind, PipelineError};

/// Suffix of record files, compared case-insensitively.
pub const RECORD_EXTENSION: &str = "json";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Folder topology the pipeline works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub watch_root: PathBuf,
    pub archive_dir: PathBuf,
    pub image_root: PathBuf,
    pub output_dir: PathBuf,
}

/// A filesystem entry that appeared in the watch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl CreatedEvent {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }
}

/// Why an event never entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Directory,
    NotARecord,
    /// Not a direct child of the watch root (e.g. inside the archive folder)
    OutsideWatchRoot,
}

/// A record that made it through every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub source: PathBuf,
    pub document: PathBuf,
    /// Where the source file now lives; `None` when archiving is disabled
    pub archived: Option<PathBuf>,
}

#[derive(Debug)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Processed(Processed),
    Failed(PipelineError),
}

impl EventOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, EventOutcome::Processed(_))
    }
}

/// Callback invoked by the event source for every entry created in the watch
/// root. Implementations must not panic out and must not block indefinitely.
pub trait FileEventHandler {
    fn on_file_created(&self, event: &CreatedEvent) -> EventOutcome;
}

/// Whether a successfully rendered record is moved to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    MoveToArchive,
    LeaveInPlace,
}

/// The record ingestion pipeline.
pub struct IngestPipeline {
    paths: PipelinePaths,
    renderer: Box<dyn DocumentRenderer>,
    archive_mode: ArchiveMode,
    stats: Arc<PipelineStats>,
}

impl IngestPipeline {
    pub fn new(paths: PipelinePaths, renderer: Box<dyn DocumentRenderer>) -> Self {
        Self {
            paths,
            renderer,
            archive_mode: ArchiveMode::MoveToArchive,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    pub fn with_archive_mode(mut self, mode: ArchiveMode) -> Self {
        self.archive_mode = mode;
        self
    }

    /// Accept records from `dir` instead of the configured watch root.
    pub fn with_watch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.watch_root = dir.into();
        self
    }

    pub fn with_stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Filter step. `Some(reason)` means the event is not for us.
    pub fn classify(&self, event: &CreatedEvent) -> Option<IgnoreReason> {
        if event.is_dir || event.path.is_dir() {
            return Some(IgnoreReason::Directory);
        }
        let is_record = event
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORD_EXTENSION));
        if !is_record {
            return Some(IgnoreReason::NotARecord);
        }
        let in_root = event
            .path
            .parent()
            .is_some_and(|parent| same_dir(parent, &self.paths.watch_root));
        if !in_root {
            return Some(IgnoreReason::OutsideWatchRoot);
        }
        None
    }

    /// Decode step.
    pub fn decode(&self, path: &Path) -> Result<Value, PipelineError> {
        decode_file(path)
    }

    /// Validate step.
    pub fn validate(&self, path: &Path, value: &Value) -> Result<TreeRecord, PipelineError> {
        parse_record(value).map_err(|reason| PipelineError::Validation {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Render step. A panicking renderer is contained here.
    pub fn render(&self, path: &Path, record: &TreeRecord) -> Result<PathBuf, PipelineError> {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.renderer
                .render(record, &self.paths.image_root, &self.paths.output_dir)
        }));
        match attempt {
            Ok(result) => result.map_err(|source| PipelineError::Render {
                path: path.to_path_buf(),
                source,
            }),
            Err(payload) => Err(PipelineError::RenderPanic {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Archive step: the commit point.
    pub fn archive(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        archive_file(path, &self.paths.archive_dir).map_err(|source| PipelineError::Archive {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Run decode → validate → render → archive for one file.
    pub fn process(&self, path: &Path) -> Result<Processed, PipelineError> {
        let value = self.decode(path)?;
        let record = self.validate(path, &value)?;
        debug!(path = %path.display(), id = %record.id, "Record valid");

        let document = self.render(path, &record)?;

        let archived = match self.archive_mode {
            ArchiveMode::MoveToArchive => {
                let moved = self.archive(path)?;
                info!(path = %moved.display(), "File archived");
                Some(moved)
            }
            ArchiveMode::LeaveInPlace => None,
        };

        Ok(Processed {
            source: path.to_path_buf(),
            document,
            archived,
        })
    }
}

impl FileEventHandler for IngestPipeline {
    fn on_file_created(&self, event: &CreatedEvent) -> EventOutcome {
        if let Some(reason) = self.classify(event) {
            debug!(path = %event.path.display(), ?reason, "Event ignored");
            self.stats.inc_ignored();
            return EventOutcome::Ignored(reason);
        }

        info!(path = %event.path.display(), "File detected");
        self.stats.inc_detected();

        match self.process(&event.path) {
            Ok(done) => {
                self.stats.inc_processed();
                EventOutcome::Processed(done)
            }
            Err(err) => {
                self.stats.record_failure(err.kind());
                log_failure(&err);
                EventOutcome::Failed(err)
            }
        }
    }
}

/// Read the whole file and parse it as JSON. A leading UTF-8 BOM is skipped.
pub fn decode_file(path: &Path) -> Result<Value, PipelineError> {
    let bytes = std::fs::read(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    serde_json::from_slice(body).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn log_failure(err: &PipelineError) {
    let path = err.path().display();
    if err.is_vanished() {
        warn!(%path, "File no longer in the watch root, skipping (already archived?)");
        return;
    }
    match err {
        PipelineError::Validation { reason, .. } => {
            error!(%path, field = reason.field().unwrap_or("-"), %reason, "Record rejected");
        }
        other => {
            error!(%path, kind = other.kind().as_str(), error = %other, "Failed to process record");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
