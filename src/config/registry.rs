//! Table registry
//!
//! Holds the table definitions (name → dedup key columns, storage location).
//! The registry is the single source of truth for which columns define
//! uniqueness; engines look columns up here on every call.
//!
//! ## Registry Document
//!
//! ```json
//! {
//!   "tables": {
//!     "users": { "deduplication_columns": ["id"] }
//!   },
//!   "data_path": "/var/lib/rowdb"
//! }
//! ```
//!
//! A file-backed registry rewrites the document (temp file + fsync + rename)
//! after every change. A change is applied in memory only once the document
//! holding it has been written.

use crate::error::{DbError, Result};
use crate::storage::write_atomically;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-table entry of the registry document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Columns whose combined value must be unique per row
    #[serde(rename = "deduplication_columns", alias = "dedup_columns")]
    pub dedup_columns: Vec<String>,
}

/// Resolved table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub dedup_columns: Vec<String>,
    /// Table file, relative to the store when the registry has no data path
    pub location: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    tables: BTreeMap<String, TableConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_path: Option<PathBuf>,
}

/// Table definitions, optionally persisted to a JSON document
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    config_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    tables: BTreeMap<String, TableConfig>,
}

impl ConfigRegistry {
    /// Registry that lives only in memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file-backed registry.
    ///
    /// Loads `config_path` if it exists, otherwise creates it. An explicit
    /// `data_path` wins over the one stored in the document; without either
    /// the data directory is `data/` next to the document.
    pub fn open(config_path: impl Into<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DbError::io(parent, e))?;
        }

        let mut registry = ConfigRegistry {
            config_path: Some(config_path.clone()),
            data_path: None,
            tables: BTreeMap::new(),
        };

        let exists = config_path
            .try_exists()
            .map_err(|e| DbError::io(&config_path, e))?;
        if exists {
            registry.reload()?;
        }

        let data_path = data_path
            .or_else(|| registry.data_path.clone())
            .unwrap_or_else(|| {
                config_path
                    .parent()
                    .map(|p| p.join("data"))
                    .unwrap_or_else(|| PathBuf::from("data"))
            });
        std::fs::create_dir_all(&data_path).map_err(|e| DbError::io(&data_path, e))?;
        registry.data_path = Some(data_path);
        registry.save()?;

        info!(
            config = %config_path.display(),
            tables = registry.tables.len(),
            "opened table registry"
        );
        Ok(registry)
    }

    /// Definition of a registered table
    pub fn get_table(&self, name: &str) -> Result<TableDefinition> {
        let config = self
            .tables
            .get(name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))?;
        Ok(TableDefinition {
            name: name.to_string(),
            dedup_columns: config.dedup_columns.clone(),
            location: self.location(name),
        })
    }

    /// Dedup key columns of a registered table
    pub fn dedup_columns(&self, name: &str) -> Result<&[String]> {
        self.tables
            .get(name)
            .map(|c| c.dedup_columns.as_slice())
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    /// Add or overwrite a table definition
    pub fn register_table<S: AsRef<str>>(&mut self, name: &str, dedup_columns: &[S]) -> Result<()> {
        validate_table_name(name)?;
        let dedup_columns = validate_dedup_columns(dedup_columns)?;
        let mut tables = self.tables.clone();
        tables.insert(name.to_string(), TableConfig { dedup_columns });
        self.persist(&tables, self.data_path.as_deref())?;
        self.tables = tables;
        debug!(table = name, "registered table");
        Ok(())
    }

    /// Add a table; an existing definition is an error only when
    /// `throw_if_exists` is set, otherwise it is left untouched.
    pub fn add_table<S: AsRef<str>>(
        &mut self,
        name: &str,
        dedup_columns: &[S],
        throw_if_exists: bool,
    ) -> Result<()> {
        if self.tables.contains_key(name) {
            if throw_if_exists {
                return Err(DbError::InvalidConfig(format!(
                    "Table already exists: {}",
                    name
                )));
            }
            return Ok(());
        }
        self.register_table(name, dedup_columns)
    }

    /// Replace the dedup columns of an existing table
    pub fn update_table<S: AsRef<str>>(
        &mut self,
        name: &str,
        dedup_columns: &[S],
        throw_if_not_found: bool,
    ) -> Result<()> {
        if !self.tables.contains_key(name) {
            if throw_if_not_found {
                return Err(DbError::UnknownTable(name.to_string()));
            }
            return Ok(());
        }
        self.register_table(name, dedup_columns)
    }

    /// Remove a table definition. The table file is left in place.
    pub fn remove_table(&mut self, name: &str, throw_if_not_found: bool) -> Result<()> {
        let mut tables = self.tables.clone();
        if tables.remove(name).is_none() {
            if throw_if_not_found {
                return Err(DbError::UnknownTable(name.to_string()));
            }
            return Ok(());
        }
        self.persist(&tables, self.data_path.as_deref())?;
        self.tables = tables;
        debug!(table = name, "removed table definition");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Registered table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }

    /// Change the data directory, creating it if needed
    pub fn set_data_path(&mut self, data_path: impl Into<PathBuf>) -> Result<()> {
        let data_path = data_path.into();
        if data_path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("data_path cannot be empty".to_string()));
        }
        std::fs::create_dir_all(&data_path).map_err(|e| DbError::io(&data_path, e))?;
        self.persist(&self.tables, Some(data_path.as_path()))?;
        self.data_path = Some(data_path);
        Ok(())
    }

    /// Table file location implied by the data path
    pub fn location(&self, name: &str) -> PathBuf {
        let file = format!("{}.csv", name);
        match &self.data_path {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Write the registry document (no-op for an in-memory registry)
    pub fn save(&self) -> Result<()> {
        self.persist(&self.tables, self.data_path.as_deref())
    }

    /// Re-read and validate the registry document
    pub fn reload(&mut self) -> Result<()> {
        let Some(path) = self.config_path.clone() else {
            return Ok(());
        };
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                DbError::InvalidConfig(format!("Config file does not exist: {}", path.display()))
            }
            _ => DbError::io(&path, e),
        })?;
        let document: RegistryDocument = serde_json::from_slice(&bytes).map_err(|e| {
            DbError::InvalidConfig(format!("Invalid config file format {}: {}", path.display(), e))
        })?;

        for (name, config) in &document.tables {
            validate_table_name(name)?;
            validate_dedup_columns(&config.dedup_columns)
                .map_err(|e| DbError::InvalidConfig(format!("Table '{}': {}", name, e)))?;
        }

        self.tables = document.tables;
        if document.data_path.is_some() {
            self.data_path = document.data_path;
        }
        Ok(())
    }

    /// Write a document holding `tables` and `data_path`
    fn persist(
        &self,
        tables: &BTreeMap<String, TableConfig>,
        data_path: Option<&Path>,
    ) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let document = RegistryDocument {
            tables: tables.clone(),
            data_path: data_path.map(Path::to_path_buf),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        write_atomically(path, &path.with_extension("json.tmp"), &bytes)
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.trim() != name;
    if bad {
        return Err(DbError::InvalidConfig(format!(
            "invalid table name '{}'",
            name
        )));
    }
    Ok(())
}

fn validate_dedup_columns<S: AsRef<str>>(columns: &[S]) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Err(DbError::InvalidConfig(
            "dedup_columns must not be empty".to_string(),
        ));
    }
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        let column = column.as_ref();
        if column.is_empty() {
            return Err(DbError::InvalidConfig(
                "dedup_columns contains an empty column name".to_string(),
            ));
        }
        if out.iter().any(|c| c == column) {
            return Err(DbError::InvalidConfig(format!(
                "dedup_columns contains duplicate entry '{}'",
                column
            )));
        }
        out.push(column.to_string());
    }
    Ok(out)
}
