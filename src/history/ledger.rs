use crate::engine::{OperationKind, OperationRecord, Statistics};
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ALL_TABLES: &str = "ALL";

/// Per-table ordered log of operation records
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    entries: BTreeMap<String, Vec<OperationRecord>>,
    total: usize,
}

/// Aggregate view over a table's history (or all of it)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    /// Table name, or `ALL`
    pub table: String,
    pub total_operations: usize,
    pub operation_counts: BTreeMap<OperationKind, usize>,
    pub total_duplicates_handled: usize,
    pub total_rows_inserted: usize,
    pub total_rows_deleted: usize,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to a table's history
    pub fn record(&mut self, table_name: &str, record: OperationRecord) {
        self.entries
            .entry(table_name.to_string())
            .or_default()
            .push(record);
        self.total += 1;
    }

    /// History of one table, oldest first. Empty if nothing was recorded.
    pub fn history_for(&self, table_name: &str) -> &[OperationRecord] {
        self.entries
            .get(table_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every table with history, by name
    pub fn all_history(&self) -> &BTreeMap<String, Vec<OperationRecord>> {
        &self.entries
    }

    /// The last `limit` entries of a table, oldest first
    pub fn recent(&self, table_name: &str, limit: usize) -> Result<&[OperationRecord]> {
        check_limit(limit)?;
        let history = self.history_for(table_name);
        Ok(&history[history.len().saturating_sub(limit)..])
    }

    /// The last `limit` entries across all tables, ordered by timestamp.
    ///
    /// Ties keep table-name order, then append order.
    pub fn recent_all(&self, limit: usize) -> Result<Vec<&OperationRecord>> {
        check_limit(limit)?;
        let mut all: Vec<&OperationRecord> = self.entries.values().flatten().collect();
        all.sort_by_key(|r| r.timestamp);
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }

    /// Aggregate counts for one table, or for all tables with `None`
    pub fn summary(&self, table_name: Option<&str>) -> OperationSummary {
        let records: Vec<&OperationRecord> = match table_name {
            Some(name) => self.history_for(name).iter().collect(),
            None => self.entries.values().flatten().collect(),
        };

        let mut summary = OperationSummary {
            table: table_name.unwrap_or(ALL_TABLES).to_string(),
            total_operations: records.len(),
            ..Default::default()
        };
        for record in records {
            *summary.operation_counts.entry(record.operation).or_insert(0) += 1;
            match &record.statistics {
                Statistics::Insert(stats) => {
                    summary.total_duplicates_handled += stats.duplicates_found;
                    summary.total_rows_inserted += stats.rows_newly_inserted;
                }
                Statistics::Delete(stats) => {
                    summary.total_rows_deleted += stats.rows_deleted;
                }
            }
        }
        summary
    }

    /// Total number of records across tables
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(DbError::InvalidArgument(
            "limit must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DeleteStatistics, InsertStatistics, OperationArgs};
    use chrono::{DateTime, Duration, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn insert(table: &str, secs: i64, new: usize, input: usize) -> OperationRecord {
        let stats = InsertStatistics::compute(input, new, 0, input - new, 0, 0, new);
        OperationRecord {
            operation: OperationKind::InsertData,
            timestamp: at(secs),
            summary: stats.summary(),
            statistics: Statistics::Insert(stats),
            args: OperationArgs::Insert {
                table_name: table.to_string(),
                input_rows: input,
                input_columns: vec!["id".to_string()],
                dedup_columns: vec!["id".to_string()],
            },
        }
    }

    fn delete(table: &str, secs: i64, old: usize, new: usize) -> OperationRecord {
        OperationRecord {
            operation: OperationKind::DeleteDataByKey,
            timestamp: at(secs),
            summary: String::new(),
            statistics: Statistics::Delete(DeleteStatistics::compute(old, new)),
            args: OperationArgs::DeleteByKey {
                table_name: table.to_string(),
                key_column: "id".to_string(),
                key_value: 1.into(),
            },
        }
    }

    #[test]
    fn test_history_for_unknown_table_is_empty() {
        let ledger = HistoryLedger::new();
        assert!(ledger.history_for("t").is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_recent_returns_suffix_in_order() {
        let mut ledger = HistoryLedger::new();
        for i in 0..3 {
            ledger.record("t", insert("t", i, 1, 1));
        }

        let recent = ledger.recent("t", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(1));
        assert_eq!(recent[1].timestamp, at(2));

        assert_eq!(ledger.recent("t", 10).unwrap().len(), 3);
        assert!(matches!(
            ledger.recent("t", 0),
            Err(DbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_recent_all_merges_by_timestamp() {
        let mut ledger = HistoryLedger::new();
        ledger.record("b", insert("b", 1, 1, 1));
        ledger.record("a", insert("a", 2, 1, 1));
        ledger.record("b", delete("b", 3, 1, 0));

        let recent = ledger.recent_all(2).unwrap();
        let tables: Vec<&str> = recent.iter().map(|r| r.table_name()).collect();
        assert_eq!(tables, vec!["a", "b"]);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_summary_aggregates() {
        let mut ledger = HistoryLedger::new();
        ledger.record("t", insert("t", 0, 3, 5));
        ledger.record("t", delete("t", 1, 3, 1));
        ledger.record("u", insert("u", 2, 1, 1));

        let t = ledger.summary(Some("t"));
        assert_eq!(t.table, "t");
        assert_eq!(t.total_operations, 2);
        assert_eq!(t.total_duplicates_handled, 2);
        assert_eq!(t.total_rows_inserted, 3);
        assert_eq!(t.total_rows_deleted, 2);
        assert_eq!(t.operation_counts[&OperationKind::DeleteDataByKey], 1);

        let all = ledger.summary(None);
        assert_eq!(all.table, "ALL");
        assert_eq!(all.total_operations, 3);
        assert_eq!(all.operation_counts[&OperationKind::InsertData], 2);
    }

    #[test]
    fn test_clear() {
        let mut ledger = HistoryLedger::new();
        ledger.record("t", insert("t", 0, 1, 1));
        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.all_history().is_empty());
    }
}
