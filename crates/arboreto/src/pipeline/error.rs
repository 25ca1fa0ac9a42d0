//! Per-file pipeline failures.
//!
//! Every variant is recoverable at file granularity: the event is logged, the
//! source file stays in the watch root, and the watch loop carries on.

use arboreto_record::ValidationError;
use arboreto_render::RenderError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which pipeline step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Decode,
    Validation,
    Render,
    Archive,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Decode => "decode",
            FailureKind::Validation => "validation",
            FailureKind::Render => "render",
            FailureKind::Archive => "archive",
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed record in {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {} rejected: {reason}", .path.display())]
    Validation {
        path: PathBuf,
        reason: ValidationError,
    },

    #[error("Render failed for {}: {source}", .path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Renderer panicked on {}: {message}", .path.display())]
    RenderPanic { path: PathBuf, message: String },

    #[error("Archive failed for {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Read { .. } | PipelineError::Decode { .. } => FailureKind::Decode,
            PipelineError::Validation { .. } => FailureKind::Validation,
            PipelineError::Render { .. } | PipelineError::RenderPanic { .. } => {
                FailureKind::Render
            }
            PipelineError::Archive { .. } => FailureKind::Archive,
        }
    }

    /// Source file the failure is about.
    pub fn path(&self) -> &PathBuf {
        match self {
            PipelineError::Read { path, .. }
            | PipelineError::Decode { path, .. }
            | PipelineError::Validation { path, .. }
            | PipelineError::Render { path, .. }
            | PipelineError::RenderPanic { path, .. }
            | PipelineError::Archive { path, .. } => path,
        }
    }

    /// True when the source file was gone by the time it was read, which is
    /// what a duplicate event for an already archived file looks like.
    pub fn is_vanished(&self) -> bool {
        matches!(
            self,
            PipelineError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound
        ) || matches!(
            self,
            PipelineError::Archive {
                source: ArchiveError::SourceMissing(_),
                ..
            }
        )
    }
}

/// Failure to move a processed record into the archive folder.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("source no longer exists: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("archive already holds {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("rename {} -> {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
