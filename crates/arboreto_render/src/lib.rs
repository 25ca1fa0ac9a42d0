//! Arboreto document rendering.
//!
//! Turns a validated [`TreeRecord`] into one output document. The pipeline
//! only sees the [`DocumentRenderer`] trait; [`DocxRenderer`] is the
//! production implementation.

pub mod docx;
pub mod error;
pub mod image;

use arboreto_record::TreeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use docx::DocxRenderer;
pub use error::{ProbeError, RenderError};
pub use image::{probe_image, ImageFormat, ImageInfo, ProbeLimits};

/// Visible text written in place of an image that cannot be embedded.
pub const IMAGE_NOT_FOUND: &str = "⚠️ Imagen no encontrada.";

/// Produces one output document per record.
pub trait DocumentRenderer: Send + Sync {
    /// File extension of produced documents, without the dot.
    fn extension(&self) -> &str;

    /// Render `record` into `output_dir`, reading images from `image_root`.
    ///
    /// Returns the path of the written document. A missing or unusable image
    /// is not an error: the document carries a placeholder instead.
    fn render(
        &self,
        record: &TreeRecord,
        image_root: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, RenderError>;
}

/// What to do when the output document for a record already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Refuse to render; the source record stays in the watch root.
    #[default]
    Fail,
    /// Replace the existing document.
    Overwrite,
    /// Write `<stem>_<YYYYMMDD_HHMMSS>.<ext>` next to the existing document.
    Timestamp,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Fail => "fail",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(ConflictPolicy::Fail),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "timestamp" => Ok(ConflictPolicy::Timestamp),
            other => Err(format!(
                "unknown conflict policy '{}' (expected fail, overwrite or timestamp)",
                other
            )),
        }
    }
}

/// Pick the path a document for `stem` should be written to under `policy`.
pub fn resolve_output_path(
    output_dir: &Path,
    stem: &str,
    extension: &str,
    policy: ConflictPolicy,
) -> Result<PathBuf, RenderError> {
    let target = output_dir.join(format!("{}.{}", stem, extension));
    if !target.exists() {
        return Ok(target);
    }

    match policy {
        ConflictPolicy::Fail => Err(RenderError::OutputExists(target)),
        ConflictPolicy::Overwrite => {
            tracing::warn!(path = %target.display(), "Overwriting existing output document");
            Ok(target)
        }
        ConflictPolicy::Timestamp => {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let mut candidate = output_dir.join(format!("{}_{}.{}", stem, stamp, extension));
            let mut n = 2;
            while candidate.exists() {
                candidate = output_dir.join(format!("{}_{}_{}.{}", stem, stamp, n, extension));
                n += 1;
            }
            tracing::info!(
                existing = %target.display(),
                path = %candidate.display(),
                "Output document exists, writing timestamped copy"
            );
            Ok(candidate)
        }
    }
}
