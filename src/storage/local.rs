//! Local filesystem table store
//!
//! Tables are `<table>.csv` files in one data directory. Writes go through
//! a per-call staging file (`<table>.csv.tmp-<pid>-<n>`) and an atomic
//! rename, so concurrent savers never share a staging path.

use super::atomic::write_atomically;
use super::store::TableStore;
use crate::error::{DbError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const TABLE_EXTENSION: &str = "csv";

/// Directory of `<table>.csv` files
#[derive(Debug)]
pub struct LocalCsvStore {
    data_path: PathBuf,
    staging_seq: AtomicU64,
}

impl LocalCsvStore {
    /// Open a store rooted at `data_path`, creating the directory if needed
    pub fn new(data_path: impl Into<PathBuf>) -> Result<Self> {
        let data_path = data_path.into();
        std::fs::create_dir_all(&data_path).map_err(|e| DbError::io(&data_path, e))?;
        Ok(LocalCsvStore {
            data_path,
            staging_seq: AtomicU64::new(0),
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn staging_path(&self, table: &str) -> PathBuf {
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        self.data_path.join(format!(
            "{}.{}.tmp-{}-{}",
            table,
            TABLE_EXTENSION,
            std::process::id(),
            seq
        ))
    }
}

impl TableStore for LocalCsvStore {
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>> {
        let path = self.location(table);
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!(table, bytes = bytes.len(), "read table file");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(table, path = %path.display(), "no table file yet");
                Ok(None)
            }
            Err(e) => Err(DbError::io(path, e)),
        }
    }

    fn write(&self, table: &str, bytes: &[u8]) -> Result<()> {
        let target = self.location(table);
        write_atomically(&target, &self.staging_path(table), bytes)?;
        debug!(table, bytes = bytes.len(), "saved table");
        Ok(())
    }

    fn exists(&self, table: &str) -> Result<bool> {
        let path = self.location(table);
        path.try_exists().map_err(|e| DbError::io(path, e))
    }

    fn location(&self, table: &str) -> PathBuf {
        self.data_path.join(format!("{}.{}", table, TABLE_EXTENSION))
    }
}
