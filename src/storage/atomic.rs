//! Write-then-rename replacement of a file
//!
//! 1. Write the bytes to `staging` (same directory as `target`)
//! 2. `sync_all` the staging file
//! 3. Rename staging over `target` (atomic on POSIX)
//! 4. On failure: staging file is removed, `target` intact

use crate::error::{DbError, Result};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::warn;

/// Replace `target` with `bytes` through the `staging` path
pub(crate) fn write_atomically(target: &Path, staging: &Path, bytes: &[u8]) -> Result<()> {
    let written = write_staging(staging, bytes).and_then(|()| std::fs::rename(staging, target));

    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_file(staging) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "failed to remove staging file"
                );
            }
        }
        return Err(DbError::io(target, e));
    }
    Ok(())
}

fn write_staging(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replaces_target_and_removes_staging() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("t.json");
        let staging = dir.path().join("t.json.tmp");
        std::fs::write(&target, b"old").unwrap();

        write_atomically(&target, &staging, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!staging.exists());
    }

    #[test]
    fn test_failed_rename_keeps_target_dir_and_cleans_staging() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("blocked");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();
        let staging = dir.path().join("blocked.tmp");

        let err = write_atomically(&target, &staging, b"new").unwrap_err();
        assert!(matches!(err, DbError::StorageIO { .. }));
        assert!(target.join("keep").exists());
        assert!(!staging.exists());
    }
}
