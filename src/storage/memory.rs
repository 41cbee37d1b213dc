//! In-memory table store for unit tests and deterministic simulation
//!
//! Tables are kept as encoded CSV bytes rather than frames, so loads go
//! through the same decode and type inference as the filesystem store.

use super::store::TableStore;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared map of table name to encoded table
#[derive(Debug, Clone, Default)]
pub struct InMemoryTableStore {
    tables: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes for a table (for testing decode failures)
    pub fn insert_raw(&self, table: &str, bytes: Vec<u8>) {
        self.tables.write().insert(table.to_string(), bytes);
    }

    /// Raw encoded bytes of a table
    pub fn raw(&self, table: &str) -> Option<Vec<u8>> {
        self.tables.read().get(table).cloned()
    }

    /// Number of persisted tables
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl TableStore for InMemoryTableStore {
    fn read(&self, table: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.read().get(table).cloned())
    }

    fn write(&self, table: &str, bytes: &[u8]) -> Result<()> {
        self.tables.write().insert(table.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.read().contains_key(table))
    }

    fn location(&self, table: &str) -> PathBuf {
        PathBuf::from(format!("memory://{}", table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Frame, Row, Scalar};
    use crate::error::DbError;

    #[test]
    fn test_inmemory_save_load() {
        let store = InMemoryTableStore::new();
        let frame = Frame::from_rows(vec![Row::new().with("id", 1).with("v", 2.5)]);

        store.save("t", &frame).unwrap();
        assert!(store.exists("t").unwrap());
        assert_eq!(store.load("t").unwrap(), frame);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_inmemory_clone_shares_tables() {
        let store = InMemoryTableStore::new();
        let other = store.clone();
        store
            .save("t", &Frame::from_rows(vec![Row::new().with("id", 1)]))
            .unwrap();

        assert_eq!(other.load("t").unwrap().get(0, "id"), Some(&Scalar::Int(1)));
    }

    #[test]
    fn test_inmemory_corrupt_bytes() {
        let store = InMemoryTableStore::new();
        store.insert_raw("t", b"a,b\n1\n".to_vec());
        assert!(matches!(store.load("t"), Err(DbError::Corrupt { .. })));
    }
}
