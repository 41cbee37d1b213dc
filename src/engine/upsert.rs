//! Upsert / merge engine
//!
//! Merges a batch into a table by dedup-key matching.
//!
//! ## Merge Rules
//!
//! - Columns are the existing columns followed by new incoming columns;
//!   cells a row lacks are `Null`
//! - Column types are re-inferred over existing and incoming cells together,
//!   so keys compare exactly as a later load will see them
//! - An incoming key already in the table replaces that row in place
//! - Within a batch the last occurrence of a key wins; new keys are appended
//!   in first-occurrence order
//! - Existing rows that repeat an earlier existing key are dropped

use super::record::{OperationArgs, OperationKind, OperationRecord, Statistics};
use super::stats::InsertStatistics;
use crate::clock::Clock;
use crate::config::ConfigRegistry;
use crate::data::{Frame, Scalar};
use crate::error::{DbError, Result};
use crate::history::HistoryLedger;
use crate::storage::{codec, TableStore};
use ahash::{AHashMap, AHashSet};
use tracing::{debug, info};

/// Result of merging rows, before persistence
#[derive(Debug)]
pub(crate) struct MergeOutcome {
    pub(crate) frame: Frame,
    pub(crate) stats: InsertStatistics,
}

/// Merges incoming batches into registered tables
pub struct UpsertEngine<'a> {
    registry: &'a ConfigRegistry,
    store: &'a dyn TableStore,
    clock: &'a dyn Clock,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(
        registry: &'a ConfigRegistry,
        store: &'a dyn TableStore,
        clock: &'a dyn Clock,
    ) -> Self {
        UpsertEngine {
            registry,
            store,
            clock,
        }
    }

    /// Merge `incoming` into `table_name`, persist, and record the operation
    pub fn upsert(
        &self,
        ledger: &mut HistoryLedger,
        table_name: &str,
        incoming: &Frame,
    ) -> Result<OperationRecord> {
        let dedup_columns = self.registry.dedup_columns(table_name)?.to_vec();
        if !incoming.is_empty() {
            if let Some(missing) = dedup_columns.iter().find(|c| !incoming.has_column(c)) {
                return Err(DbError::InvalidConfig(format!(
                    "Dedup column '{}' for table '{}' is missing from incoming columns {:?}",
                    missing,
                    table_name,
                    incoming.columns()
                )));
            }
        }

        let existing = self.store.load(table_name)?;
        let stats = if incoming.is_empty() {
            debug!(table = table_name, "empty batch, table left untouched");
            InsertStatistics::empty_batch(existing.height())
        } else {
            let outcome = merge(existing, incoming, &dedup_columns);
            self.store.save(table_name, &outcome.frame)?;
            outcome.stats
        };

        info!(
            table = table_name,
            input = stats.input_rows,
            new = stats.rows_newly_inserted,
            updated = stats.rows_updated,
            duplicates = stats.duplicates_found,
            size = stats.new_table_size,
            "upsert complete"
        );

        let record = OperationRecord {
            operation: OperationKind::InsertData,
            timestamp: self.clock.now(),
            summary: stats.summary(),
            args: OperationArgs::Insert {
                table_name: table_name.to_string(),
                input_rows: incoming.height(),
                input_columns: incoming.columns().to_vec(),
                dedup_columns,
            },
            statistics: Statistics::Insert(stats),
        };
        ledger.record(table_name, record.clone());
        Ok(record)
    }
}

/// Merge a non-empty batch into the existing rows.
///
/// Every dedup column must be present in `incoming`.
pub(crate) fn merge(existing: Frame, incoming: &Frame, dedup_columns: &[String]) -> MergeOutcome {
    let (mut columns, existing_rows) = existing.into_parts();
    for name in incoming.columns() {
        if !columns.contains(name) {
            columns.push(name.clone());
        }
    }
    let width = columns.len();
    let old_table_size = existing_rows.len();

    // Existing and incoming rows share one retyping pass
    let mut rows: Vec<Vec<Scalar>> = Vec::with_capacity(old_table_size + incoming.height());
    for mut row in existing_rows {
        row.resize(width, Scalar::Null);
        rows.push(row);
    }
    let positions: Vec<usize> = incoming
        .columns()
        .iter()
        .filter_map(|name| columns.iter().position(|c| c == name))
        .collect();
    for source in incoming.rows() {
        let mut row = vec![Scalar::Null; width];
        for (value, &pos) in source.iter().zip(&positions) {
            row[pos] = value.clone();
        }
        rows.push(row);
    }
    codec::retype_columns(&mut rows, width);
    let incoming_rows = rows.split_off(old_table_size);

    let key_positions: Vec<usize> = dedup_columns
        .iter()
        .filter_map(|name| columns.iter().position(|c| c == name))
        .collect();
    let key_of = |row: &[Scalar]| -> Vec<Scalar> {
        key_positions.iter().map(|&i| row[i].clone()).collect()
    };

    let mut index: AHashMap<Vec<Scalar>, usize> = AHashMap::with_capacity(rows.len());
    let mut merged: Vec<Vec<Scalar>> = Vec::with_capacity(rows.len() + incoming_rows.len());
    for row in rows {
        let key = key_of(&row);
        if index.contains_key(&key) {
            continue;
        }
        index.insert(key, merged.len());
        merged.push(row);
    }
    let existing_unique = merged.len();

    let input_rows = incoming_rows.len();
    let mut seen: AHashSet<Vec<Scalar>> = AHashSet::with_capacity(input_rows);
    let mut rows_newly_inserted = 0;
    let mut rows_updated = 0;
    let mut intra_batch_duplicates = 0;

    for row in incoming_rows {
        let key = key_of(&row);
        let first_in_batch = seen.insert(key.clone());
        if !first_in_batch {
            intra_batch_duplicates += 1;
        }
        match index.get(&key) {
            Some(&pos) => {
                if first_in_batch && pos < existing_unique {
                    rows_updated += 1;
                }
                merged[pos] = row;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(row);
                rows_newly_inserted += 1;
            }
        }
    }

    let stats = InsertStatistics::compute(
        input_rows,
        rows_newly_inserted,
        intra_batch_duplicates,
        rows_updated,
        existing_unique - rows_updated,
        old_table_size,
        merged.len(),
    );

    #[cfg(debug_assertions)]
    verify_unique_keys(&merged, &key_positions);

    MergeOutcome {
        frame: Frame::from_parts(columns, merged),
        stats,
    }
}

#[cfg(debug_assertions)]
fn verify_unique_keys(rows: &[Vec<Scalar>], key_positions: &[usize]) {
    let mut keys: AHashSet<Vec<&Scalar>> = AHashSet::with_capacity(rows.len());
    for row in rows {
        let key: Vec<&Scalar> = key_positions.iter().map(|&i| &row[i]).collect();
        debug_assert!(
            keys.insert(key),
            "Invariant violated: merged rows contain a repeated dedup key"
        );
    }
}
