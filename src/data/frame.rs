//! Tabular row sets
//!
//! `Frame` is the in-memory form of a table or of a batch of incoming rows:
//! an ordered column list plus rows aligned to it. `Row` is the ordered
//! column-name to value mapping callers use to build batches.

use super::value::Scalar;
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};

/// An ordered mapping from column name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: Vec<(String, Scalar)>,
}

impl Row {
    pub fn new() -> Self {
        Row { fields: Vec::new() }
    }

    /// Builder form of `set`
    pub fn with(mut self, column: &str, value: impl Into<Scalar>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, overwriting in place if it already exists
    pub fn set(&mut self, column: &str, value: impl Into<Scalar>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Column list plus aligned rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Frame {
    /// Create an empty frame with the given columns.
    ///
    /// Fails with `InvalidArgument` on a duplicate or empty column name.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(DbError::InvalidArgument("empty column name".to_string()));
            }
            if columns[..i].contains(name) {
                return Err(DbError::InvalidArgument(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }
        Ok(Frame {
            columns,
            rows: Vec::new(),
        })
    }

    /// Frame with no columns and no rows
    pub fn empty() -> Self {
        Frame::default()
    }

    /// Build a frame from rows whose column sets may differ.
    ///
    /// Columns are the union in first-seen order; cells a row lacks are
    /// `Null`.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let rows: Vec<Row> = rows.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for name in row.columns() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        let data = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Scalar::Null))
                    .collect()
            })
            .collect();
        Frame {
            columns,
            rows: data,
        }
    }

    /// Assemble a frame whose rows are already aligned to `columns`
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        debug_assert!(
            rows.iter().all(|r| r.len() == columns.len()),
            "Invariant violated: every row must have one value per column"
        );
        Frame { columns, rows }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Scalar>>) {
        (self.columns, self.rows)
    }

    /// Append a row given in column order
    pub fn push_row(&mut self, values: Vec<Scalar>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DbError::InvalidArgument(format!(
                "row has {} values but frame has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    /// Builder form of `push_row`
    pub fn with_row(mut self, values: Vec<Scalar>) -> Result<Self> {
        self.push_row(values)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in column `name`
    pub fn get(&self, row: usize, name: &str) -> Option<&Scalar> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Scalar>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn row(&self, idx: usize) -> Option<Row> {
        self.rows.get(idx).map(|values| self.to_row(values))
    }

    pub fn to_rows(&self) -> Vec<Row> {
        self.rows.iter().map(|values| self.to_row(values)).collect()
    }

    fn to_row(&self, values: &[Scalar]) -> Row {
        let mut row = Row::new();
        for (name, value) in self.columns.iter().zip(values) {
            row.set(name, value.clone());
        }
        row
    }
}
