//! Query Layer
//!
//! Evaluates SQL expressions against live table state. Nothing here is
//! persisted or recorded in history, and no relational operator is
//! implemented on this side: filtering, joins, grouping and sorting all
//! belong to the execution engine.
//!
//! ## Architecture
//!
//! ```text
//! "SELECT * FROM orders WHERE amount > $min"
//!        │ referenced_tables
//!        ▼
//!   registry check + fresh load of every referenced table
//!        │
//!        ▼
//!   Bindings ──► ExecutionEngine::execute(params) ──► Frame
//! ```
//!
//! Parameters are substituted into the planned tree, never spliced into the
//! text, so a bound value cannot change the shape of a query. Unquoted SQL
//! identifiers are lowercased; a table with uppercase letters in its name
//! must be quoted (`SELECT * FROM "Orders"`).

mod convert;
mod execute;

pub use execute::{
    Bindings, BoundTable, DataFusionEngine, EngineError, EngineResult, ExecutionEngine,
    PlanDescription,
};

use crate::config::ConfigRegistry;
use crate::data::{Frame, Params};
use crate::error::{DbError, Result};
use crate::storage::TableStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a query reads and which parameters it needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExplanation {
    /// Sorted, without duplicates
    pub tables: Vec<String>,
    /// Placeholder names without `$`, sorted
    pub parameters: Vec<String>,
    /// Indented logical plan
    pub plan: String,
}

/// Binds tables and parameters and delegates evaluation
pub struct QueryEngine<'a> {
    registry: &'a ConfigRegistry,
    store: &'a dyn TableStore,
    engine: &'a dyn ExecutionEngine,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        registry: &'a ConfigRegistry,
        store: &'a dyn TableStore,
        engine: &'a dyn ExecutionEngine,
    ) -> Self {
        QueryEngine {
            registry,
            store,
            engine,
        }
    }

    /// Run an expression with `$name` placeholders bound from `parameters`
    pub fn query(&self, expression: &str, parameters: &Params) -> Result<Frame> {
        let bindings = self.bind(expression)?;
        debug!(
            expression,
            tables = ?bindings.names().collect::<Vec<_>>(),
            parameters = parameters.len(),
            "query bound"
        );

        self.engine
            .execute(expression, &bindings, parameters)
            .map_err(|e| wrap(expression, parameters, e))
    }

    /// Referenced tables, required parameters and the plan, without
    /// executing anything
    pub fn explain(&self, expression: &str) -> Result<QueryExplanation> {
        let bindings = self.bind(expression)?;
        let description = self
            .engine
            .explain(expression, &bindings)
            .map_err(|e| wrap(expression, &Params::new(), e))?;
        Ok(QueryExplanation {
            tables: bindings.names().map(str::to_string).collect(),
            parameters: description.parameters,
            plan: description.plan,
        })
    }

    /// Load exactly the registered tables the expression names
    fn bind(&self, expression: &str) -> Result<Bindings> {
        let tables = self
            .engine
            .referenced_tables(expression)
            .map_err(|e| wrap(expression, &Params::new(), e))?;
        if let Some(missing) = tables.iter().find(|t| !self.registry.contains(t)) {
            return Err(DbError::UnknownTable(missing.clone()));
        }

        let mut bindings = Bindings::new();
        for table in &tables {
            let bound = match self.store.read(table)? {
                Some(bytes) => BoundTable::from_csv(&bytes),
                None => Ok(BoundTable::default()),
            };
            let bound = bound.map_err(|message| DbError::Corrupt {
                path: self.store.location(table),
                message,
            })?;
            bindings.insert(table, bound);
        }
        Ok(bindings)
    }
}

fn wrap(expression: &str, parameters: &Params, error: EngineError) -> DbError {
    match error {
        EngineError::Syntax(message) => DbError::QuerySyntax {
            expression: expression.to_string(),
            message,
        },
        EngineError::UnboundParameter(name) => DbError::UndefinedParameter(name),
        EngineError::Evaluation(message) => DbError::QueryEvaluation {
            expression: expression.to_string(),
            parameters: parameters.clone(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, Scalar};
    use crate::storage::InMemoryTableStore;

    fn setup() -> (ConfigRegistry, InMemoryTableStore) {
        let mut registry = ConfigRegistry::new();
        registry.register_table("orders", &["id"]).unwrap();
        registry.register_table("empty", &["id"]).unwrap();
        let store = InMemoryTableStore::new();
        let orders = Frame::from_rows(vec![
            Row::new().with("id", 1).with("amount", 10).with("note", "a"),
            Row::new().with("id", 2).with("amount", 30).with("note", "b"),
        ]);
        store.save("orders", &orders).unwrap();
        (registry, store)
    }

    fn params(pairs: &[(&str, Scalar)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_query_with_parameter() {
        let (registry, store) = setup();
        let engine = QueryEngine::new(&registry, &store, &DataFusionEngine);
        let out = engine
            .query(
                "SELECT id FROM orders WHERE amount > $min",
                &params(&[("min", 15.into())]),
            )
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.get(0, "id"), Some(&Scalar::Int(2)));
    }

    #[test]
    fn test_parameter_value_is_data_not_syntax() {
        let (registry, store) = setup();
        let engine = QueryEngine::new(&registry, &store, &DataFusionEngine);
        let out = engine
            .query(
                "SELECT * FROM orders WHERE note = $note",
                &params(&[("note", "a' OR '1'='1".into())]),
            )
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_error_mapping() {
        let (registry, store) = setup();
        let engine = QueryEngine::new(&registry, &store, &DataFusionEngine);

        let err = engine
            .query("SELECT * FROM orders WHERE amount >", &Params::new())
            .unwrap_err();
        assert!(matches!(err, DbError::QuerySyntax { .. }));

        let err = engine
            .query("SELECT * FROM orders WHERE amount > $min", &Params::new())
            .unwrap_err();
        assert!(matches!(err, DbError::UndefinedParameter(ref p) if p == "min"));

        let err = engine.query("SELECT * FROM ghosts", &Params::new()).unwrap_err();
        assert!(matches!(err, DbError::UnknownTable(ref t) if t == "ghosts"));

        let err = engine
            .query("SELECT nope FROM orders", &Params::new())
            .unwrap_err();
        match err {
            DbError::QueryEvaluation {
                expression,
                message,
                ..
            } => {
                assert_eq!(expression, "SELECT nope FROM orders");
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_registered_table_without_file_is_empty() {
        let (registry, store) = setup();
        let engine = QueryEngine::new(&registry, &store, &DataFusionEngine);
        let out = engine
            .query("SELECT COUNT(*) AS n FROM empty", &Params::new())
            .unwrap();
        assert_eq!(out.get(0, "n"), Some(&Scalar::Int(0)));
    }

    #[test]
    fn test_explain() {
        let (mut registry, store) = setup();
        registry.register_table("users", &["id"]).unwrap();
        let users = Frame::from_rows(vec![Row::new().with("id", 1).with("name", "ann")]);
        store.save("users", &users).unwrap();
        let engine = QueryEngine::new(&registry, &store, &DataFusionEngine);

        let err = engine
            .explain("SELECT * FROM orders WHERE amount BETWEEN $lo")
            .unwrap_err();
        assert!(matches!(err, DbError::QuerySyntax { .. }));

        let explanation = engine
            .explain(
                "SELECT o.id FROM users u JOIN orders o ON o.id = u.id \
                 WHERE o.amount > $lo AND o.amount < $hi",
            )
            .unwrap();
        assert_eq!(explanation.tables, vec!["orders", "users"]);
        assert_eq!(explanation.parameters, vec!["hi", "lo"]);
    }
}
