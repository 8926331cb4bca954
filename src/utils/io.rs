//! File I/O primitives that fail with `internal.io_error`.
//!
//! Every helper takes an `operation` label which becomes the error context,
//! e.g. "IO error (write config snapshot): Permission denied".

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

fn io_error(err: impl ToString, operation: &str) -> Error {
    Error::internal_io(err.to_string(), Some(operation.to_string()))
}

pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_error(e, operation))
}

pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| io_error(e, operation))
}

/// Writes through a sibling `.tmp` file and renames it over `path`, so a
/// reader never sees a half-written document.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let (Some(parent), Some(filename)) = (path.parent(), path.file_name()) else {
        return Err(io_error(format!("invalid path: {}", path.display()), operation));
    };
    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| io_error(e, &format!("{} (write temp)", operation)))?;
    fs::rename(&tmp_path, path).map_err(|e| io_error(e, &format!("{} (rename)", operation)))
}

/// Create a directory and its parents. Succeeds if it already exists.
pub fn ensure_dir(path: &Path, operation: &str) -> Result<()> {
    tracing::debug!(path = %path.display(), "make directory");
    fs::create_dir_all(path).map_err(|e| io_error(e, operation))
}

/// Remove a file. A file that is already gone is not an error.
pub fn remove_file_if_exists(path: &Path, operation: &str) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(e, operation)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_operation() {
        let err = read_file(Path::new("/nonexistent/report.json"), "read report").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
        assert!(err.message.contains("read report"));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let err = write_file(Path::new("/nonexistent/dir/file.txt"), "content", "write report")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn atomic_write_replaces_content_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatecheck-config.yml");
        write_file(&path, "old", "seed").unwrap();

        write_file_atomic(&path, "new", "persist config").unwrap();
        assert_eq!(read_file(&path, "read back").unwrap(), "new");
        assert!(!dir.path().join("gatecheck-config.yml.tmp").exists());
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("artifacts/nested");
        ensure_dir(&nested, "create artifact directory").unwrap();
        ensure_dir(&nested, "create artifact directory").unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_file_if_exists(&dir.path().join("image.tar"), "remove image archive").unwrap();
    }
}
