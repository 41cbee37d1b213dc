//! Operation statistics
//!
//! Rates are percentages rounded to two decimals, `0.0` when the base is
//! empty.

use serde::{Deserialize, Serialize};

/// Outcome counts of one upsert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertStatistics {
    pub input_rows: usize,
    /// Distinct incoming keys that were absent before the merge
    pub rows_newly_inserted: usize,
    /// Incoming rows colliding with an existing row or an earlier batch row
    pub duplicates_found: usize,
    /// Incoming rows whose key repeats an earlier row of the same batch
    pub intra_batch_duplicates: usize,
    /// Distinct incoming keys that were present before the merge
    pub rows_updated: usize,
    /// Existing rows no incoming row touched
    pub rows_preserved: usize,
    pub old_table_size: usize,
    pub new_table_size: usize,
    pub net_rows_added: i64,
    pub duplication_rate: f64,
}

impl InsertStatistics {
    /// Statistics of an empty batch against a table of `table_size` rows
    pub fn empty_batch(table_size: usize) -> Self {
        InsertStatistics {
            rows_preserved: table_size,
            old_table_size: table_size,
            new_table_size: table_size,
            ..Default::default()
        }
    }

    pub(crate) fn compute(
        input_rows: usize,
        rows_newly_inserted: usize,
        intra_batch_duplicates: usize,
        rows_updated: usize,
        rows_preserved: usize,
        old_table_size: usize,
        new_table_size: usize,
    ) -> Self {
        let duplicates_found = input_rows - rows_newly_inserted;
        InsertStatistics {
            input_rows,
            rows_newly_inserted,
            duplicates_found,
            intra_batch_duplicates,
            rows_updated,
            rows_preserved,
            old_table_size,
            new_table_size,
            net_rows_added: new_table_size as i64 - old_table_size as i64,
            duplication_rate: percent(duplicates_found, input_rows),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Inserted {} rows: {} new, {} updates, {} duplicates handled",
            self.input_rows, self.rows_newly_inserted, self.rows_updated, self.duplicates_found
        )
    }
}

/// Outcome counts of one delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatistics {
    pub rows_deleted: usize,
    pub new_table_size: usize,
    pub old_table_size: usize,
    pub rows_preserved: usize,
    pub deletion_rate: f64,
    pub preservation_rate: f64,
}

impl DeleteStatistics {
    pub(crate) fn compute(old_table_size: usize, new_table_size: usize) -> Self {
        let rows_deleted = old_table_size - new_table_size;
        DeleteStatistics {
            rows_deleted,
            new_table_size,
            old_table_size,
            rows_preserved: new_table_size,
            deletion_rate: percent(rows_deleted, old_table_size),
            preservation_rate: percent(new_table_size, old_table_size),
        }
    }
}

/// `part / whole * 100`, rounded to two decimals
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
