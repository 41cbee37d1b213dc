//! Database session
//!
//! `Database` owns the registry, the table store, the history ledger, the
//! clock and the execution engine, and exposes every public operation.
//! Mutating calls take `&mut self`; each one is a full load-mutate-save
//! cycle and returns the `OperationRecord` it appended to the ledger.
//!
//! ```
//! use rowdb::{Database, Frame, Params, Row};
//!
//! let mut db = Database::in_memory();
//! db.register_table("users", &["id"]).unwrap();
//!
//! let batch = Frame::from_rows(vec![
//!     Row::new().with("id", 1).with("name", "ann"),
//!     Row::new().with("id", 2).with("name", "bob"),
//! ]);
//! let record = db.insert_data("users", &batch).unwrap();
//! assert_eq!(record.insert_statistics().unwrap().rows_newly_inserted, 2);
//!
//! let out = db.query("SELECT * FROM users WHERE id > 1", &Params::new()).unwrap();
//! assert_eq!(out.height(), 1);
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigRegistry, DatabaseConfig, TableDefinition};
use crate::data::{ColumnType, Frame, Params, Scalar};
use crate::engine::{DeleteEngine, OperationRecord, UpsertEngine};
use crate::error::Result;
use crate::history::{HistoryLedger, OperationSummary};
use crate::query::{DataFusionEngine, ExecutionEngine, QueryEngine, QueryExplanation};
use crate::storage::{codec, InMemoryTableStore, LocalCsvStore, TableStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Shape of a registered table as currently persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub exists: bool,
    pub rows: usize,
    pub columns: Vec<String>,
    pub column_types: Vec<ColumnType>,
    pub dedup_columns: Vec<String>,
    pub location: PathBuf,
}

/// A store session
pub struct Database {
    registry: ConfigRegistry,
    store: Box<dyn TableStore>,
    ledger: HistoryLedger,
    clock: Arc<dyn Clock>,
    engine: Box<dyn ExecutionEngine>,
    /// Store is a `LocalCsvStore` rooted at the registry's data path
    follows_data_path: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("registry", &self.registry)
            .field("ledger_entries", &self.ledger.len())
            .field("follows_data_path", &self.follows_data_path)
            .finish()
    }
}

impl Database {
    /// Open a file-backed session: registry document plus a directory of
    /// CSV tables.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let registry = ConfigRegistry::open(&config.config_path, config.data_path.clone())?;
        let data_path = registry
            .data_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let store = LocalCsvStore::new(&data_path)?;
        info!(
            config = %config.config_path.display(),
            data = %data_path.display(),
            tables = registry.len(),
            "database opened"
        );
        let mut db = Database::with_store(registry, store);
        db.follows_data_path = true;
        Ok(db)
    }

    /// Session with an in-memory registry and store
    pub fn in_memory() -> Self {
        Database::with_store(ConfigRegistry::new(), InMemoryTableStore::new())
    }

    /// Session over an explicit registry and store, with the system clock
    /// and the DataFusion engine
    pub fn with_store(registry: ConfigRegistry, store: impl TableStore + 'static) -> Self {
        Database {
            registry,
            store: Box::new(store),
            ledger: HistoryLedger::new(),
            clock: Arc::new(SystemClock),
            engine: Box::new(DataFusionEngine),
            follows_data_path: false,
        }
    }

    /// Replace the clock records are stamped with
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the query execution engine
    pub fn with_engine(mut self, engine: impl ExecutionEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Upsert a batch into a registered table
    pub fn insert_data(&mut self, table_name: &str, data: &Frame) -> Result<OperationRecord> {
        UpsertEngine::new(&self.registry, self.store.as_ref(), self.clock.as_ref()).upsert(
            &mut self.ledger,
            table_name,
            data,
        )
    }

    /// Delete rows whose `date_column` lies in `[start, end]`
    pub fn delete_data_by_date(
        &mut self,
        table_name: &str,
        date_column: &str,
        start: impl Into<Scalar>,
        end: impl Into<Scalar>,
    ) -> Result<OperationRecord> {
        DeleteEngine::new(&self.registry, self.store.as_ref(), self.clock.as_ref()).delete_by_date(
            &mut self.ledger,
            table_name,
            date_column,
            start.into(),
            end.into(),
        )
    }

    /// Delete rows whose `key_column` equals `key_value`
    pub fn delete_data_by_key(
        &mut self,
        table_name: &str,
        key_column: &str,
        key_value: impl Into<Scalar>,
    ) -> Result<OperationRecord> {
        DeleteEngine::new(&self.registry, self.store.as_ref(), self.clock.as_ref()).delete_by_key(
            &mut self.ledger,
            table_name,
            key_column,
            key_value.into(),
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn query_engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.registry, self.store.as_ref(), self.engine.as_ref())
    }

    /// Evaluate a SQL expression with `$name` parameters
    pub fn query(&self, expression: &str, parameters: &Params) -> Result<Frame> {
        self.query_engine().query(expression, parameters)
    }

    pub fn explain_query(&self, expression: &str) -> Result<QueryExplanation> {
        self.query_engine().explain(expression)
    }

    /// Full contents of a registered table
    pub fn read_table(&self, table_name: &str) -> Result<Frame> {
        self.registry.get_table(table_name)?;
        self.store.load(table_name)
    }

    pub fn get_table_info(&self, table_name: &str) -> Result<TableInfo> {
        let definition = self.registry.get_table(table_name)?;
        let exists = self.store.exists(table_name)?;
        let frame = self.store.load(table_name)?;
        Ok(TableInfo {
            table_name: definition.name,
            exists,
            rows: frame.height(),
            column_types: codec::column_types(&frame),
            columns: frame.columns().to_vec(),
            dedup_columns: definition.dedup_columns,
            location: self.store.location(table_name),
        })
    }

    /// One row per registered table:
    /// `table_name, exists, rows, columns, dedup_columns`
    pub fn show_tables(&self) -> Result<Frame> {
        let columns = ["table_name", "exists", "rows", "columns", "dedup_columns"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut rows = Vec::with_capacity(self.registry.len());
        for name in self.registry.table_names() {
            let info = self.get_table_info(&name)?;
            rows.push(vec![
                Scalar::Str(info.table_name),
                Scalar::Bool(info.exists),
                Scalar::Int(info.rows as i64),
                Scalar::Int(info.columns.len() as i64),
                Scalar::Str(info.dedup_columns.join(",")),
            ]);
        }
        Ok(Frame::from_parts(columns, rows))
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn get_operation_history(&self, table_name: &str) -> &[OperationRecord] {
        self.ledger.history_for(table_name)
    }

    pub fn get_all_history(&self) -> &BTreeMap<String, Vec<OperationRecord>> {
        self.ledger.all_history()
    }

    /// Last `limit` operations on a table, oldest first
    pub fn get_recent_operations(
        &self,
        table_name: &str,
        limit: usize,
    ) -> Result<&[OperationRecord]> {
        self.ledger.recent(table_name, limit)
    }

    /// Last `limit` operations across every table, oldest first
    pub fn get_recent_operations_all(&self, limit: usize) -> Result<Vec<&OperationRecord>> {
        self.ledger.recent_all(limit)
    }

    pub fn get_operation_summary(&self, table_name: Option<&str>) -> OperationSummary {
        self.ledger.summary(table_name)
    }

    pub fn clear_history(&mut self) {
        self.ledger.clear();
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    // =========================================================================
    // Registry
    // =========================================================================

    pub fn register_table<S: AsRef<str>>(&mut self, table_name: &str, dedup_columns: &[S]) -> Result<()> {
        self.registry.register_table(table_name, dedup_columns)
    }

    pub fn add_table<S: AsRef<str>>(
        &mut self,
        table_name: &str,
        dedup_columns: &[S],
        throw_if_exists: bool,
    ) -> Result<()> {
        self.registry
            .add_table(table_name, dedup_columns, throw_if_exists)
    }

    pub fn update_table<S: AsRef<str>>(
        &mut self,
        table_name: &str,
        dedup_columns: &[S],
        throw_if_not_found: bool,
    ) -> Result<()> {
        self.registry
            .update_table(table_name, dedup_columns, throw_if_not_found)
    }

    /// Drop a registry entry; the table file is left in place
    pub fn remove_table(&mut self, table_name: &str, throw_if_not_found: bool) -> Result<()> {
        self.registry.remove_table(table_name, throw_if_not_found)
    }

    pub fn get_table(&self, table_name: &str) -> Result<TableDefinition> {
        self.registry.get_table(table_name)
    }

    /// Registered table names, sorted
    pub fn list_tables(&self) -> Vec<String> {
        self.registry.table_names()
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.registry.data_path()
    }

    /// Move the table directory; a file-backed session re-roots its store
    pub fn set_data_path(&mut self, data_path: impl Into<PathBuf>) -> Result<()> {
        let data_path = data_path.into();
        self.registry.set_data_path(&data_path)?;
        if self.follows_data_path {
            self.store = Box::new(LocalCsvStore::new(data_path)?);
        }
        Ok(())
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }
}
