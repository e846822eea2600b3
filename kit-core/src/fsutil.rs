//! Filesystem helpers for crash-safe writes

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Write data to a file atomically using temp-file-then-rename.
///
/// Readers see either the old file or the new one, never a partial write.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = lock_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// `<path>.lock`, keeping any extension the file already has
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn test_lock_path_keeps_extension() {
        let dir = TempDir::new().unwrap();
        let heads = dir.path().join("refs/heads");
        assert_eq!(lock_path(&heads.join("v1.2")), heads.join("v1.2.lock"));
        assert_ne!(lock_path(&heads.join("v1.2")), lock_path(&heads.join("v1.3")));
        assert_eq!(lock_path(&heads.join("main")), heads.join("main.lock"));

        atomic_write(&heads.join("v1.2"), b"two").unwrap();
        atomic_write(&heads.join("v1.3"), b"three").unwrap();
        assert_eq!(fs::read(heads.join("v1.2")).unwrap(), b"two");
        assert_eq!(fs::read(heads.join("v1.3")).unwrap(), b"three");
    }
}
