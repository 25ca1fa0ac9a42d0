//! Folder bootstrap: make sure the folder topology exists before watching.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// A required folder could not be created. Fatal to startup.
#[derive(Error, Debug)]
#[error("Failed to create folder {}: {source}", .path.display())]
pub struct BootstrapError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Create every folder in `folders` (recursively) if missing.
///
/// Idempotent. Stops at the first folder that cannot be created.
pub fn ensure_folders<P: AsRef<Path>>(folders: &[P]) -> Result<(), BootstrapError> {
    for folder in folders {
        let folder = folder.as_ref();
        match std::fs::create_dir_all(folder) {
            Ok(()) => info!(path = %folder.display(), "Folder ready"),
            Err(source) => {
                error!(path = %folder.display(), error = %source, "Failed to create folder");
                return Err(BootstrapError {
                    path: folder.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(())
}
