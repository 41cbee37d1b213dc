//! Query execution
//!
//! `ExecutionEngine` is the seam between binding and evaluation. The
//! columnar engine does all relational work; this side only hands it the
//! whitelisted tables and the parameter values.
//!
//! `DataFusionEngine` is the default implementation:
//!
//! 1. Parse the SQL expression (generic dialect, one statement)
//! 2. Register every bound table as a `MemTable` in a fresh session
//! 3. Plan; reject anything but a read-only query
//! 4. Replace `$name` placeholders in the plan with literal values
//! 5. Execute and collect into a `Frame`

use super::convert;
use crate::data::{ColumnType, Frame, Params};
use crate::storage::codec;
use datafusion::arrow::error::ArrowError;
use datafusion::common::{ParamValues, TableReference};
use datafusion::error::DataFusionError;
use datafusion::execution::context::SQLOptions;
use datafusion::logical_expr::LogicalPlan;
use datafusion::prelude::{SessionConfig, SessionContext};
use datafusion::sql::parser::{DFParser, Statement};
use datafusion::sql::sqlparser::dialect::GenericDialect;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Errors
// ============================================================================

/// Failure inside an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Expression is not valid SQL
    Syntax(String),
    /// Placeholder without a supplied value (name without `$`)
    UnboundParameter(String),
    /// Planning or execution failed
    Evaluation(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            EngineError::UnboundParameter(name) => write!(f, "no value for ${}", name),
            EngineError::Evaluation(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DataFusionError> for EngineError {
    fn from(e: DataFusionError) -> Self {
        match e {
            DataFusionError::SQL(parse, _) => EngineError::Syntax(parse.to_string()),
            other => EngineError::Evaluation(other.to_string()),
        }
    }
}

impl From<ArrowError> for EngineError {
    fn from(e: ArrowError) -> Self {
        EngineError::Evaluation(e.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Bindings
// ============================================================================

/// One table's rows as canonical CSV plus the column types a merge would
/// infer for them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundTable {
    columns: Vec<(String, ColumnType)>,
    csv: Vec<u8>,
}

impl BoundTable {
    /// Bind a frame's current rows
    pub fn from_frame(frame: &Frame) -> Result<Self, String> {
        let columns = frame
            .columns()
            .iter()
            .cloned()
            .zip(codec::column_types(frame))
            .collect();
        let csv = codec::encode(frame).map_err(|e| e.to_string())?;
        Ok(BoundTable { columns, csv })
    }

    /// Bind a persisted table file
    pub fn from_csv(bytes: &[u8]) -> Result<Self, String> {
        Self::from_frame(&codec::decode(bytes)?)
    }

    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    pub fn csv(&self) -> &[u8] {
        &self.csv
    }
}

/// The only tables an expression may read, freshly loaded for one call
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    tables: BTreeMap<String, BoundTable>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, table: BoundTable) {
        self.tables.insert(name.to_string(), table);
    }

    pub fn get(&self, name: &str) -> Option<&BoundTable> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Planned-but-not-executed view of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDescription {
    /// Placeholder names without `$`, sorted
    pub parameters: Vec<String>,
    /// Indented logical plan
    pub plan: String,
}

// ============================================================================
// Engine seam
// ============================================================================

/// Evaluates expressions over bound tables
pub trait ExecutionEngine: Send + Sync {
    /// Tables the expression reads, sorted and deduplicated
    fn referenced_tables(&self, expression: &str) -> EngineResult<Vec<String>>;

    /// Plan without executing
    fn explain(&self, expression: &str, tables: &Bindings) -> EngineResult<PlanDescription>;

    /// Evaluate with every placeholder replaced by its value
    fn execute(&self, expression: &str, tables: &Bindings, parameters: &Params)
        -> EngineResult<Frame>;
}

/// Apache DataFusion over in-memory tables
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFusionEngine;

impl DataFusionEngine {
    pub fn new() -> Self {
        DataFusionEngine
    }

    fn block_on<F: std::future::Future>(future: F) -> EngineResult<F::Output> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| EngineError::Evaluation(format!("engine runtime: {}", e)))?;
        Ok(runtime.block_on(future))
    }

    /// Fresh session holding exactly the bound tables, and the read-only plan
    async fn plan(expression: &str, tables: &Bindings) -> EngineResult<(SessionContext, LogicalPlan)> {
        let statement = parse_single(expression)?;

        let config = SessionConfig::new().with_target_partitions(1);
        let ctx = SessionContext::new_with_config(config);
        for (name, table) in &tables.tables {
            ctx.register_table(
                TableReference::bare(name.as_str()),
                Arc::new(convert::mem_table(table)?),
            )?;
        }

        let plan = ctx.state().statement_to_plan(statement).await?;
        SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false)
            .verify_plan(&plan)?;
        Ok((ctx, plan))
    }

    async fn run(expression: &str, tables: &Bindings, parameters: &Params) -> EngineResult<Frame> {
        let (ctx, plan) = Self::plan(expression, tables).await?;

        let mut values = HashMap::new();
        for name in placeholder_names(&plan)? {
            let value = parameters
                .get(&name)
                .ok_or_else(|| EngineError::UnboundParameter(name.clone()))?;
            values.insert(name, convert::scalar_value(value));
        }
        let plan = if values.is_empty() {
            plan
        } else {
            plan.with_param_values(ParamValues::Map(values))?
        };

        let df = ctx.execute_logical_plan(plan).await?;
        let schema = df.schema().as_arrow().clone();
        let batches = df.collect().await?;
        Ok(convert::frame(&schema, &batches)?)
    }
}

impl ExecutionEngine for DataFusionEngine {
    fn referenced_tables(&self, expression: &str) -> EngineResult<Vec<String>> {
        let statement = parse_single(expression)?;
        let references = SessionContext::new()
            .state()
            .resolve_table_references(&statement)?;
        let names: BTreeSet<String> = references.iter().map(ToString::to_string).collect();
        Ok(names.into_iter().collect())
    }

    fn explain(&self, expression: &str, tables: &Bindings) -> EngineResult<PlanDescription> {
        let (_, plan) = Self::block_on(Self::plan(expression, tables))??;
        let description = PlanDescription {
            parameters: placeholder_names(&plan)?,
            plan: plan.display_indent().to_string(),
        };
        Ok(description)
    }

    fn execute(
        &self,
        expression: &str,
        tables: &Bindings,
        parameters: &Params,
    ) -> EngineResult<Frame> {
        let frame = Self::block_on(Self::run(expression, tables, parameters))??;
        debug!(
            tables = tables.len(),
            rows = frame.height(),
            columns = frame.width(),
            "query executed"
        );
        Ok(frame)
    }
}

fn parse_single(expression: &str) -> EngineResult<Statement> {
    let mut statements = DFParser::parse_sql_with_dialect(expression, &GenericDialect {})
        .map_err(|e| EngineError::Syntax(e.to_string()))?;
    match (statements.pop_front(), statements.is_empty()) {
        (Some(statement), true) => Ok(statement),
        (None, _) => Err(EngineError::Syntax("empty expression".to_string())),
        (Some(_), false) => Err(EngineError::Syntax(
            "expected exactly one statement".to_string(),
        )),
    }
}

/// Placeholder names of a plan without the leading `$`, sorted
fn placeholder_names(plan: &LogicalPlan) -> EngineResult<Vec<String>> {
    let mut names: Vec<String> = plan
        .get_parameter_types()?
        .into_keys()
        .map(|id| id.trim_start_matches('$').to_string())
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, Scalar};

    fn bindings() -> Bindings {
        let users = Frame::from_rows(vec![
            Row::new().with("id", 1).with("name", "ann"),
            Row::new().with("id", 2).with("name", "bob"),
        ]);
        let mut tables = Bindings::new();
        tables.insert("users", BoundTable::from_frame(&users).unwrap());
        tables
    }

    #[test]
    fn test_referenced_tables_skips_ctes_and_dedups() {
        let engine = DataFusionEngine::new();
        let tables = engine
            .referenced_tables(
                "WITH recent AS (SELECT * FROM orders) \
                 SELECT * FROM recent JOIN users ON recent.id = users.id \
                 WHERE users.id IN (SELECT id FROM orders)",
            )
            .unwrap();
        assert_eq!(tables, vec!["orders", "users"]);
    }

    #[test]
    fn test_multiple_statements_are_rejected() {
        let err = DataFusionEngine
            .referenced_tables("SELECT 1; SELECT 2")
            .unwrap_err();
        assert!(matches!(err, EngineError::Syntax(_)));
    }

    #[test]
    fn test_execute_binds_placeholders_as_literals() {
        let mut params = Params::new();
        params.insert("name".to_string(), Scalar::from("bob' OR '1'='1"));
        let out = DataFusionEngine
            .execute("SELECT id FROM users WHERE name = $name", &bindings(), &params)
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns(), &["id".to_string()]);

        params.insert("name".to_string(), Scalar::from("bob"));
        let out = DataFusionEngine
            .execute("SELECT id FROM users WHERE name = $name", &bindings(), &params)
            .unwrap();
        assert_eq!(out.get(0, "id"), Some(&Scalar::Int(2)));
    }

    #[test]
    fn test_unbound_placeholder() {
        let err = DataFusionEngine
            .execute("SELECT * FROM users WHERE id = $id", &bindings(), &Params::new())
            .unwrap_err();
        assert_eq!(err, EngineError::UnboundParameter("id".to_string()));
    }

    #[test]
    fn test_only_bound_tables_are_visible() {
        let err = DataFusionEngine
            .execute("SELECT * FROM orders", &bindings(), &Params::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(ref m) if m.contains("orders")));
    }

    #[test]
    fn test_writes_are_rejected() {
        for statement in [
            "INSERT INTO users VALUES (3, 'cy')",
            "CREATE TABLE t AS SELECT 1",
            "DROP TABLE users",
        ] {
            let err = DataFusionEngine
                .execute(statement, &bindings(), &Params::new())
                .unwrap_err();
            assert!(matches!(err, EngineError::Evaluation(_)), "{}", statement);
        }
    }

    #[test]
    fn test_explain_lists_placeholders() {
        let description = DataFusionEngine
            .explain("SELECT * FROM users WHERE id > $lo AND id < $hi", &bindings())
            .unwrap();
        assert_eq!(description.parameters, vec!["hi", "lo"]);
        assert!(description.plan.contains("users"));
    }
}
