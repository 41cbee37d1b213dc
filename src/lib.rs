//! Embeddable row store over flat CSV table files.
//!
//! Deduplicating upserts, date-range and exact-key deletes, a per-session
//! audit ledger, and parameterized SQL queries against named tables.

pub mod client;
pub mod clock;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod history;
pub mod observability;
pub mod query;
pub mod storage;

pub use client::{Database, TableInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigRegistry, DatabaseConfig, TableDefinition};
pub use data::{ColumnType, Frame, Params, Row, Scalar};
pub use engine::{
    DeleteStatistics, InsertStatistics, OperationArgs, OperationKind, OperationRecord, Statistics,
};
pub use error::{DbError, Result};
pub use history::{HistoryLedger, OperationSummary};
pub use observability::{init_tracing, LogConfig};
pub use query::{DataFusionEngine, QueryExplanation};
pub use storage::{InMemoryTableStore, LocalCsvStore, TableStore};
