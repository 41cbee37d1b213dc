//! Delete engine
//!
//! Two modes:
//! - **by date**: rows whose date column lies in `[start, end]`, inclusive.
//!   On a datetime column a date-only bound covers its whole day
//! - **by key**: rows whose key column equals a value exactly
//!
//! Both re-persist the table even when no row matched.

use super::record::{OperationArgs, OperationKind, OperationRecord, Statistics};
use super::stats::DeleteStatistics;
use crate::clock::Clock;
use crate::config::ConfigRegistry;
use crate::data::{ColumnType, Frame, Scalar};
use crate::error::{DbError, Result};
use crate::history::HistoryLedger;
use crate::storage::TableStore;
use std::cmp::Ordering;
use tracing::info;

pub struct DeleteEngine<'a> {
    registry: &'a ConfigRegistry,
    store: &'a dyn TableStore,
    clock: &'a dyn Clock,
}

impl<'a> DeleteEngine<'a> {
    pub fn new(
        registry: &'a ConfigRegistry,
        store: &'a dyn TableStore,
        clock: &'a dyn Clock,
    ) -> Self {
        DeleteEngine {
            registry,
            store,
            clock,
        }
    }

    /// Remove rows whose `date_column` lies in `[start, end]`.
    ///
    /// String bounds are parsed into the column's type. `Null` cells never
    /// match. Every other cell must be comparable with both bounds, otherwise
    /// the call fails with `InvalidArgument` and nothing is deleted.
    pub fn delete_by_date(
        &self,
        ledger: &mut HistoryLedger,
        table_name: &str,
        date_column: &str,
        start: Scalar,
        end: Scalar,
    ) -> Result<OperationRecord> {
        self.registry.get_table(table_name)?;
        let frame = self.store.load(table_name)?;
        let idx = column_index(&frame, table_name, date_column)?;

        let sample = first_non_null(&frame, idx);
        let lo = resolve_bound(&start, sample, false);
        let hi = resolve_bound(&end, sample, true);
        match lo.compare(&hi) {
            Some(Ordering::Greater) => {
                return Err(DbError::InvalidArgument(format!(
                    "start {} is after end {}",
                    start, end
                )))
            }
            None => {
                return Err(DbError::InvalidArgument(format!(
                    "bounds {} and {} are not comparable",
                    start, end
                )))
            }
            Some(_) => {}
        }
        let incomparable = frame.rows().iter().map(|row| &row[idx]).find(|cell| {
            !cell.is_null() && (cell.compare(&lo).is_none() || cell.compare(&hi).is_none())
        });
        if let Some(cell) = incomparable {
            return Err(DbError::InvalidArgument(format!(
                "value {} in column '{}' is not comparable with bounds {} and {}",
                cell, date_column, start, end
            )));
        }

        let in_range = |cell: &Scalar| {
            matches!(cell.compare(&lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(cell.compare(&hi), Some(Ordering::Less | Ordering::Equal))
        };
        let stats = self.retain(table_name, frame, |row| !in_range(&row[idx]))?;

        let summary = format!(
            "Deleted {} rows ({}% of table) between {} and {}",
            stats.rows_deleted,
            render_rate(stats.deletion_rate),
            start,
            end
        );
        info!(
            table = table_name,
            column = date_column,
            deleted = stats.rows_deleted,
            remaining = stats.new_table_size,
            "delete by date complete"
        );

        let record = OperationRecord {
            operation: OperationKind::DeleteDataByDate,
            timestamp: self.clock.now(),
            summary,
            statistics: Statistics::Delete(stats),
            args: OperationArgs::DeleteByDate {
                table_name: table_name.to_string(),
                date_column: date_column.to_string(),
                start,
                end,
            },
        };
        ledger.record(table_name, record.clone());
        Ok(record)
    }

    /// Remove rows whose `key_column` equals `key_value`.
    ///
    /// A string value is parsed into each cell's type before comparing; there
    /// is no partial matching.
    pub fn delete_by_key(
        &self,
        ledger: &mut HistoryLedger,
        table_name: &str,
        key_column: &str,
        key_value: Scalar,
    ) -> Result<OperationRecord> {
        self.registry.get_table(table_name)?;
        let frame = self.store.load(table_name)?;
        let idx = column_index(&frame, table_name, key_column)?;

        let stats = self.retain(table_name, frame, |row| {
            let cell = &row[idx];
            key_value.coerce_like(cell) != *cell
        })?;

        let summary = format!(
            "Deleted {} rows ({}% of table) with {}='{}'",
            stats.rows_deleted,
            render_rate(stats.deletion_rate),
            key_column,
            key_value
        );
        info!(
            table = table_name,
            column = key_column,
            deleted = stats.rows_deleted,
            remaining = stats.new_table_size,
            "delete by key complete"
        );

        let record = OperationRecord {
            operation: OperationKind::DeleteDataByKey,
            timestamp: self.clock.now(),
            summary,
            statistics: Statistics::Delete(stats),
            args: OperationArgs::DeleteByKey {
                table_name: table_name.to_string(),
                key_column: key_column.to_string(),
                key_value,
            },
        };
        ledger.record(table_name, record.clone());
        Ok(record)
    }

    fn retain<F>(&self, table_name: &str, frame: Frame, keep: F) -> Result<DeleteStatistics>
    where
        F: Fn(&[Scalar]) -> bool,
    {
        let old_table_size = frame.height();
        let (columns, rows) = frame.into_parts();
        let survivors: Vec<Vec<Scalar>> = rows.into_iter().filter(|row| keep(row)).collect();
        let new_table_size = survivors.len();

        self.store
            .save(table_name, &Frame::from_parts(columns, survivors))?;
        Ok(DeleteStatistics::compute(old_table_size, new_table_size))
    }
}

fn column_index(frame: &Frame, table_name: &str, column: &str) -> Result<usize> {
    frame
        .column_index(column)
        .ok_or_else(|| DbError::unknown_column(table_name, column, frame.columns()))
}

fn first_non_null(frame: &Frame, idx: usize) -> Option<&Scalar> {
    frame.rows().iter().map(|r| &r[idx]).find(|v| !v.is_null())
}

/// Bring a caller bound into the type of the column `sample` comes from.
///
/// Against a datetime column a date (or date-only string) starts at
/// midnight, and as an end bound runs through the last instant of its day.
fn resolve_bound(bound: &Scalar, sample: Option<&Scalar>, is_end: bool) -> Scalar {
    let Some(sample) = sample else {
        return bound.clone();
    };
    let mut value = bound.coerce_like(sample);
    if let (Scalar::Str(text), Scalar::DateTime(_)) = (&value, sample) {
        if let Some(date) = Scalar::parse_as(text, ColumnType::Date) {
            value = date;
        }
    }
    match (value, sample) {
        (Scalar::Date(day), Scalar::DateTime(_)) => {
            let instant = if is_end {
                day.and_hms_nano_opt(23, 59, 59, 999_999_999)
            } else {
                day.and_hms_opt(0, 0, 0)
            };
            instant.map_or(Scalar::Date(day), Scalar::DateTime)
        }
        (value, _) => value,
    }
}

/// Rates print like the persisted floats: `50.0`, `66.67`
fn render_rate(rate: f64) -> String {
    Scalar::Float(rate).render()
}
