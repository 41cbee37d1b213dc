//! Error type shared by every component of the store.
//!
//! All failures surface to the caller as a typed `DbError`. Nothing is
//! converted into an empty result: a merge or delete that appears to succeed
//! with the wrong semantics is worse than a returned error.

use crate::data::Params;
use std::io::Error as IoError;
use std::path::PathBuf;

/// Error type for store operations
#[derive(Debug)]
pub enum DbError {
    /// Table is not registered
    UnknownTable(String),
    /// Malformed dedup configuration, or a batch missing key columns
    InvalidConfig(String),
    /// Referenced column is absent from a table's schema
    UnknownColumn {
        table: String,
        column: String,
        available: Vec<String>,
    },
    /// Query references a parameter that was not supplied
    UndefinedParameter(String),
    /// Filesystem failure while loading or persisting
    StorageIO { path: PathBuf, source: IoError },
    /// Persisted table file could not be decoded
    Corrupt { path: PathBuf, message: String },
    /// Malformed call arguments (non-positive limit, inverted range, ...)
    InvalidArgument(String),
    /// Query expression could not be parsed
    QuerySyntax { expression: String, message: String },
    /// Execution engine rejected a bound query
    QueryEvaluation {
        expression: String,
        parameters: Params,
        message: String,
    },
}

impl DbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        DbError::StorageIO {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unknown_column(table: &str, column: &str, available: &[String]) -> Self {
        DbError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
            available: available.to_vec(),
        }
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::UnknownTable(name) => write!(f, "Table not found: {}", name),
            DbError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            DbError::UnknownColumn {
                table,
                column,
                available,
            } => write!(
                f,
                "Column '{}' not found in table '{}'. Available columns: {:?}",
                column, table, available
            ),
            DbError::UndefinedParameter(name) => {
                write!(f, "Query references undefined parameter '${}'", name)
            }
            DbError::StorageIO { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            DbError::Corrupt { path, message } => {
                write!(f, "Corrupt table file {}: {}", path.display(), message)
            }
            DbError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            DbError::QuerySyntax {
                expression,
                message,
            } => write!(f, "Syntax error in query '{}': {}", expression, message),
            DbError::QueryEvaluation {
                expression,
                parameters,
                message,
            } => write!(
                f,
                "Error executing query '{}' with parameters {:?}: {}",
                expression, parameters, message
            ),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::StorageIO { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::InvalidConfig(format!("JSON error: {}", e))
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        DbError::InvalidConfig(format!("TOML error: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
