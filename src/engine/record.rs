//! Operation records
//!
//! One immutable record per mutating call, appended to the session's
//! history ledger and returned to the caller.

use super::stats::{DeleteStatistics, InsertStatistics};
use crate::data::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mutating operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    InsertData,
    DeleteDataByDate,
    DeleteDataByKey,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::InsertData => "insert_data",
            OperationKind::DeleteDataByDate => "delete_data_by_date",
            OperationKind::DeleteDataByKey => "delete_data_by_key",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statistics {
    Insert(InsertStatistics),
    Delete(DeleteStatistics),
}

impl Statistics {
    pub fn as_insert(&self) -> Option<&InsertStatistics> {
        match self {
            Statistics::Insert(stats) => Some(stats),
            Statistics::Delete(_) => None,
        }
    }

    pub fn as_delete(&self) -> Option<&DeleteStatistics> {
        match self {
            Statistics::Delete(stats) => Some(stats),
            Statistics::Insert(_) => None,
        }
    }
}

/// Call arguments kept with a record. Row contents are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationArgs {
    Insert {
        table_name: String,
        input_rows: usize,
        input_columns: Vec<String>,
        dedup_columns: Vec<String>,
    },
    DeleteByDate {
        table_name: String,
        date_column: String,
        start: Scalar,
        end: Scalar,
    },
    DeleteByKey {
        table_name: String,
        key_column: String,
        key_value: Scalar,
    },
}

impl OperationArgs {
    pub fn table_name(&self) -> &str {
        match self {
            OperationArgs::Insert { table_name, .. }
            | OperationArgs::DeleteByDate { table_name, .. }
            | OperationArgs::DeleteByKey { table_name, .. } => table_name,
        }
    }
}

/// Audit entry for one mutating call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub statistics: Statistics,
    pub args: OperationArgs,
}

impl OperationRecord {
    pub fn table_name(&self) -> &str {
        self.args.table_name()
    }

    pub fn insert_statistics(&self) -> Option<&InsertStatistics> {
        self.statistics.as_insert()
    }

    pub fn delete_statistics(&self) -> Option<&DeleteStatistics> {
        self.statistics.as_delete()
    }
}
