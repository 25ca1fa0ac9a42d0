//! One-shot batch driver: render every record already sitting in a folder.
//!
//! Records are rendered but not archived, so a batch run can be repeated
//! (with an `overwrite` or `timestamp` output policy) without moving inputs.

use crate::pipeline::{ArchiveMode, CreatedEvent, EventOutcome, FileEventHandler, IngestPipeline};
use crate::stats::StatsSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

#[derive(Error, Debug)]
#[error("Failed to list {}: {source}", .path.display())]
pub struct BatchError {
    pub path: PathBuf,
    #[source]
    pub source: walkdir::Error,
}

/// Per-file result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub source: PathBuf,
    pub document: Option<PathBuf>,
    /// Failure kind and message, when the record failed
    pub failure: Option<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    pub stats: StatsSnapshot,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|entry| entry.failure.is_none())
    }
}

/// Record files directly inside `dir`, sorted by name.
pub fn list_records(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| BatchError {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Run every record file in `dir` through `pipeline`, without archiving.
pub fn run_batch(pipeline: IngestPipeline, dir: &Path) -> Result<BatchReport, BatchError> {
    let pipeline = pipeline
        .with_archive_mode(ArchiveMode::LeaveInPlace)
        .with_watch_root(dir);
    let files = list_records(dir)?;
    info!(dir = %dir.display(), files = files.len(), "Batch started");

    let mut entries = Vec::new();
    for path in files {
        match pipeline.on_file_created(&CreatedEvent::file(&path)) {
            EventOutcome::Ignored(_) => {}
            EventOutcome::Processed(done) => entries.push(BatchEntry {
                source: done.source,
                document: Some(done.document),
                failure: None,
            }),
            EventOutcome::Failed(err) => entries.push(BatchEntry {
                source: path,
                document: None,
                failure: Some((err.kind().as_str().to_string(), err.to_string())),
            }),
        }
    }

    let stats = pipeline.stats().snapshot();
    info!(%stats, "Batch finished");
    Ok(BatchReport { entries, stats })
}
