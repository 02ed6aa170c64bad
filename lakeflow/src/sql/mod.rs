//! SQL stages and ad hoc queries.
//!
//! A small single-node subset of `SELECT`, parsed with `sqlparser` and
//! evaluated row by row over in-memory [`Table`]s:
//!
//! ```text
//! SELECT <*, t.*, expr [AS alias], COUNT(*), SUM|AVG|MIN|MAX|COUNT(expr), DATE_TRUNC('unit', expr)>
//! FROM t [AS a] [JOIN u [AS b] ON <predicate>]...
//! [WHERE <predicate>] [GROUP BY <expr | alias | ordinal>] [HAVING <predicate>]
//! [ORDER BY <output column | ordinal> [ASC|DESC]] [LIMIT n] [OFFSET n]
//! ```
//!
//! `$name` anywhere a literal may appear reads the run parameter `name`.

mod exec;
mod parse;

pub use exec::{execute, execute_with};
pub use parse::{parse_query, referenced_tables, SqlStageFile};

use crate::catalog::{Catalog, CatalogError};
use crate::context::StageContext;
use crate::errors::StageError;
use crate::stages::Stage;
use crate::table::{Table, TableError};
use async_trait::async_trait;
use sqlparser::ast::Query;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while parsing or evaluating SQL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SqlError {
    /// The text is not valid SQL.
    #[error("SQL parse error: {0}")]
    Parse(String),

    /// Valid SQL outside the supported subset.
    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    /// The `-- lakeflow:` header is malformed.
    #[error("invalid SQL header: {0}")]
    Header(String),

    /// A referenced table is not available.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A referenced column does not exist.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A `$name` placeholder names no run parameter.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// An unqualified column name matches more than one table.
    #[error("column '{0}' is ambiguous")]
    AmbiguousColumn(String),

    /// An expression was applied to values of the wrong type.
    #[error("type error: {0}")]
    Type(String),

    /// Building the result table failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Reading an input from the catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Runs `sql` against the tables at `reference`.
///
/// # Errors
///
/// Returns parse and evaluation errors, and catalog errors for unknown
/// references or tables.
pub fn query(catalog: &dyn Catalog, sql: &str, reference: &str) -> Result<Table, SqlError> {
    let parsed = parse_query(sql)?;
    let mut tables = HashMap::new();
    for name in referenced_tables(&parsed)? {
        let table = catalog.get_table(&name, reference)?;
        tables.insert(name, table);
    }
    debug!(reference, tables = tables.len(), "Running query");
    execute(&parsed, &|name| tables.get(name).cloned())
}

/// A stage defined by a SQL query over its inputs.
#[derive(Debug, Clone)]
pub struct SqlStage {
    name: String,
    sql: String,
    query: Box<Query>,
    inputs: Vec<String>,
}

impl SqlStage {
    /// Parses `sql`; the stage's inputs are the tables it reads.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError`] if the query cannot be parsed or falls outside
    /// the supported subset.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Result<Self, SqlError> {
        let sql = sql.into();
        let query = parse_query(&sql)?;
        let inputs = referenced_tables(&query)?;
        Ok(Self {
            name: name.into(),
            sql,
            query,
            inputs,
        })
    }

    /// Tables the query reads, in order of first appearance.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// The query text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Stage for SqlStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<Table, StageError> {
        let mut tables: HashMap<&str, Arc<Table>> = HashMap::new();
        for name in &self.inputs {
            tables.insert(name.as_str(), ctx.input(name)?);
        }
        execute_with(&self.query, &|name| tables.get(name).cloned(), ctx.parameters())
            .map_err(|e| ctx.error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CommitMeta, MemoryCatalog, TableChange, TableChanges, MAIN_BRANCH};
    use crate::context::StageInputs;
    use crate::table::Value;

    fn seeded() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        let table = Table::from_columns(vec![
            ("zone", vec![Value::from("Queens"), Value::from("Bronx"), Value::from("Queens")]),
            ("fare", vec![Value::Float(10.0), Value::Float(7.5), Value::Float(20.0)]),
        ])
        .unwrap();
        let mut changes = TableChanges::new();
        changes.insert("trips".to_string(), TableChange::Put(Arc::new(table)));
        catalog
            .commit(MAIN_BRANCH, changes, CommitMeta::new("seed", "ada"), None)
            .unwrap();
        catalog
    }

    #[test]
    fn test_query_against_catalog() {
        let catalog = seeded();
        let out = query(
            &catalog,
            "SELECT zone, COUNT(*) AS trips FROM trips GROUP BY zone ORDER BY trips DESC",
            MAIN_BRANCH,
        )
        .unwrap();
        assert_eq!(out.value(0, "zone"), Some(&Value::from("Queens")));
        assert_eq!(out.value(0, "trips"), Some(&Value::Int(2)));

        let err = query(&catalog, "SELECT * FROM nope", MAIN_BRANCH).unwrap_err();
        assert!(matches!(err, SqlError::Catalog(CatalogError::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn test_sql_stage_reads_declared_inputs() {
        let stage = SqlStage::new("expensive", "SELECT zone FROM trips WHERE fare > 9").unwrap();
        assert_eq!(stage.inputs(), ["trips".to_string()]);

        let catalog = seeded();
        let trips = catalog.get_table("trips", MAIN_BRANCH).unwrap();
        let tables = HashMap::from([("trips".to_string(), trips)]);
        let ctx = StageContext::detached(stage.name(), StageInputs::new(tables, stage.inputs().to_vec(), stage.name()));

        let out = stage.execute(&ctx).await.unwrap();
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn test_sql_stage_rejects_bad_sql() {
        assert!(matches!(SqlStage::new("s", "SELEC 1"), Err(SqlError::Parse(_))));
        assert!(matches!(
            SqlStage::new("s", "SELECT * FROM a UNION SELECT * FROM b"),
            Err(SqlError::Unsupported(_))
        ));
    }
}
