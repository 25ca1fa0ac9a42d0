//! Error types for document rendering

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce an output document.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Output document already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Document packaging error: {0}")]
    Package(#[from] zip::result::ZipError),
}

impl RenderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RenderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reason an image cannot be embedded.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("image not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("image path escapes the image root: {0}")]
    OutsideRoot(String),

    #[error("extension not allowed (use one of {allowed}): {}", .path.display())]
    UnsupportedExtension { path: PathBuf, allowed: String },

    #[error("image too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("image dimensions {width}x{height} exceed {max_width}x{max_height}")]
    TooManyPixels {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("unrecognized image data: {}", .0.display())]
    Unrecognized(PathBuf),

    #[error("IO error reading image: {0}")]
    Io(#[from] io::Error),
}
