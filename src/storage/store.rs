//! Table store abstraction
//!
//! Implementations:
//! - `LocalCsvStore`: one CSV file per table in a data directory
//! - `InMemoryTableStore`: encoded tables kept in memory, for tests and DST
//!
//! Stores only move encoded bytes. `load` and `save` go through the shared
//! codec, so a table read back from either store has identical column order,
//! types and absent markers.

use super::codec;
use crate::data::Frame;
use crate::error::{DbError, Result};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Persistence for whole tables
pub trait TableStore: Send + Sync {
    /// Encoded table, or `None` if nothing is persisted
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the encoded table atomically
    fn write(&self, table: &str, bytes: &[u8]) -> Result<()>;

    /// Whether the table has persisted content
    fn exists(&self, table: &str) -> Result<bool>;

    /// Where the table lives (file path or store key)
    fn location(&self, table: &str) -> PathBuf;

    /// Full row set of a table, or an empty frame if nothing is persisted
    fn load(&self, table: &str) -> Result<Frame> {
        match self.read(table)? {
            Some(bytes) => codec::decode(&bytes).map_err(|message| DbError::Corrupt {
                path: self.location(table),
                message,
            }),
            None => Ok(Frame::empty()),
        }
    }

    /// Replace the persisted row set atomically
    fn save(&self, table: &str, frame: &Frame) -> Result<()> {
        let bytes = codec::encode(frame).map_err(|e| {
            DbError::io(
                self.location(table),
                std::io::Error::new(ErrorKind::Other, e.to_string()),
            )
        })?;
        self.write(table, &bytes)
    }
}
