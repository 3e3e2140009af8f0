//! File open helpers shared by the status store, the log and the page file.
//!
//! Each store lives in `<path>.<suffix>`. Opening maps the OS error kinds to
//! the crate's precondition errors so callers can tell a missing file from
//! an unreadable one.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// `<path>.<suffix>`, appending the suffix rather than replacing an existing
/// extension.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Create a new read/write file. Fails if it already exists.
pub fn create_new(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
            ErrorKind::PermissionDenied => Error::FileCannotReadWrite(path.to_path_buf()),
            _ => Error::Io(e),
        })
}

/// Open an existing file for reading and writing.
pub fn open_existing(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(Error::FileNotExists(path.to_path_buf()));
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotExists(path.to_path_buf()),
            ErrorKind::PermissionDenied => Error::FileCannotReadWrite(path.to_path_buf()),
            _ => Error::Io(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_with_suffix_appends() {
        assert_eq!(
            with_suffix(Path::new("/data/db.v2"), "log"),
            PathBuf::from("/data/db.v2.log")
        );
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");

        create_new(&path).unwrap();
        assert!(matches!(create_new(&path), Err(Error::FileExists(_))));
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");

        assert!(matches!(open_existing(&path), Err(Error::FileNotExists(_))));
    }
}
