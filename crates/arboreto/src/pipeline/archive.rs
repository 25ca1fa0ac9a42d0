//! Archive step: the commit point of the pipeline.
//!
//! A record file that reaches the archive folder is never processed again.
//! The move is a rename within the watch root's filesystem, so it is atomic.

use super::error::ArchiveError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Move `source` into `archive_dir`, keeping its file name.
///
/// Never overwrites: an existing file of the same name in the archive is a
/// collision and the source stays where it is.
pub fn archive_file(source: &Path, archive_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let name = source
        .file_name()
        .ok_or_else(|| ArchiveError::SourceMissing(source.to_path_buf()))?;
    let destination = archive_dir.join(name);

    if fs::symlink_metadata(&destination).is_ok() {
        return Err(ArchiveError::DestinationExists(destination));
    }

    match fs::rename(source, &destination) {
        Ok(()) => Ok(destination),
        Err(err) if err.kind() == io::ErrorKind::NotFound && !source.exists() => {
            Err(ArchiveError::SourceMissing(source.to_path_buf()))
        }
        Err(err) => Err(ArchiveError::Rename {
            from: source.to_path_buf(),
            to: destination,
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("entrada");
        let archive = root.join("procesados");
        fs::create_dir_all(&archive).unwrap();
        (dir, root, archive)
    }

    #[test]
    fn test_moves_and_keeps_name() {
        let (_dir, root, archive) = layout();
        let source = root.join("roble.json");
        fs::write(&source, b"{}").unwrap();

        let moved = archive_file(&source, &archive).unwrap();
        assert_eq!(moved, archive.join("roble.json"));
        assert!(!source.exists());
        assert_eq!(fs::read(&moved).unwrap(), b"{}");
    }

    #[test]
    fn test_second_archive_fails_cleanly() {
        let (_dir, root, archive) = layout();
        let source = root.join("roble.json");
        fs::write(&source, b"{}").unwrap();

        archive_file(&source, &archive).unwrap();
        let err = archive_file(&source, &archive).unwrap_err();
        // the archived copy is what blocks a second move
        assert!(matches!(err, ArchiveError::DestinationExists(_)));
    }

    #[test]
    fn test_missing_source() {
        let (_dir, root, archive) = layout();
        let err = archive_file(&root.join("ghost.json"), &archive).unwrap_err();
        assert!(matches!(err, ArchiveError::SourceMissing(_)));
    }

    #[test]
    fn test_collision_keeps_both_files() {
        let (_dir, root, archive) = layout();
        let source = root.join("roble.json");
        fs::write(&source, b"new").unwrap();
        fs::write(archive.join("roble.json"), b"old").unwrap();

        let err = archive_file(&source, &archive).unwrap_err();
        assert!(matches!(err, ArchiveError::DestinationExists(_)));
        assert_eq!(fs::read(&source).unwrap(), b"new");
        assert_eq!(fs::read(archive.join("roble.json")).unwrap(), b"old");
    }

    #[test]
    fn test_missing_archive_dir_is_rename_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("roble.json");
        fs::write(&source, b"{}").unwrap();

        let err = archive_file(&source, &dir.path().join("no_archive")).unwrap_err();
        assert!(matches!(err, ArchiveError::Rename { .. }));
        assert!(source.exists());
    }
}
