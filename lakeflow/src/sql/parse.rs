//! Parsing SQL text and `.sql` stage files.

use super::{SqlError, SqlStage};
use crate::core::Materialization;
use sqlparser::ast::{Query, SetExpr, Statement, TableFactor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

const HEADER_PREFIX: &str = "lakeflow:";

/// Parses a single `SELECT` statement.
///
/// # Errors
///
/// Returns [`SqlError::Parse`] for invalid SQL and
/// [`SqlError::Unsupported`] for anything but exactly one query.
pub fn parse_query(sql: &str) -> Result<Box<Query>, SqlError> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if statements.len() != 1 {
        return Err(SqlError::Unsupported(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }
    match statements.remove(0) {
        Statement::Query(query) => Ok(query),
        other => Err(SqlError::Unsupported(format!("only SELECT is supported, found: {other}"))),
    }
}

/// Tables read by `FROM` and `JOIN`, in order of first appearance.
///
/// # Errors
///
/// Returns [`SqlError::Unsupported`] for CTEs, set operations, subqueries
/// and table functions.
pub fn referenced_tables(query: &Query) -> Result<Vec<String>, SqlError> {
    if query.with.is_some() {
        return Err(SqlError::Unsupported("WITH clauses".to_string()));
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(SqlError::Unsupported(format!("query body: {}", query.body)));
    };
    let mut tables: Vec<String> = Vec::new();
    for from in &select.from {
        let factors = std::iter::once(&from.relation).chain(from.joins.iter().map(|j| &j.relation));
        for factor in factors {
            let name = table_name(factor)?;
            if !tables.contains(&name) {
                tables.push(name);
            }
        }
    }
    Ok(tables)
}

pub(super) fn table_name(factor: &TableFactor) -> Result<String, SqlError> {
    match factor {
        TableFactor::Table { name, .. } => name
            .0
            .last()
            .map(|ident| ident.value.clone())
            .ok_or_else(|| SqlError::Unsupported("empty table name".to_string())),
        other => Err(SqlError::Unsupported(format!("table expression: {other}"))),
    }
}

/// A stage read from a `.sql` file.
///
/// The output is named after the file, inputs are the tables the query
/// reads, and a leading comment sets the materialization:
///
/// ```sql
/// -- lakeflow: materialize=replace
/// SELECT zone, COUNT(*) AS trips FROM clean GROUP BY zone
/// ```
#[derive(Debug, Clone)]
pub struct SqlStageFile {
    /// Stage and output name.
    pub name: String,
    /// Materialization from the header; transient when absent.
    pub materialize: Materialization,
    /// The parsed stage.
    pub stage: SqlStage,
}

impl SqlStageFile {
    /// Parses the contents of `<name>.sql`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::Header`] for a malformed header and any error
    /// from [`SqlStage::new`].
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, SqlError> {
        let name = name.into();
        let materialize = parse_header(text)?.unwrap_or_default();
        let stage = SqlStage::new(name.clone(), text)?;
        Ok(Self {
            name,
            materialize,
            stage,
        })
    }

    /// Tables the query reads.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        self.stage.inputs()
    }
}

fn parse_header(text: &str) -> Result<Option<Materialization>, SqlError> {
    let mut materialize = None;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        let Some(comment) = line.strip_prefix("--") else {
            break;
        };
        let Some(directives) = comment.trim().strip_prefix(HEADER_PREFIX) else {
            continue;
        };
        for token in directives
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| SqlError::Header(format!("expected key=value, found '{token}'")))?;
            match key {
                "materialize" => {
                    materialize = Some(
                        Materialization::parse(value)
                            .ok_or_else(|| SqlError::Header(format!("unknown materialization '{value}'")))?,
                    );
                }
                other => return Err(SqlError::Header(format!("unknown key '{other}'"))),
            }
        }
    }
    Ok(materialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_tables_in_order() {
        let query = parse_query(
            "SELECT t.zone, z.borough FROM trips t JOIN zones z ON t.zone_id = z.id JOIN trips x ON x.id = t.id",
        )
        .unwrap();
        assert_eq!(referenced_tables(&query).unwrap(), vec!["trips", "zones"]);
    }

    #[test]
    fn test_rejects_non_queries() {
        assert!(matches!(parse_query("DROP TABLE trips"), Err(SqlError::Unsupported(_))));
        assert!(matches!(parse_query("SELECT 1; SELECT 2"), Err(SqlError::Unsupported(_))));
        let cte = parse_query("WITH a AS (SELECT 1) SELECT * FROM a").unwrap();
        assert!(matches!(referenced_tables(&cte), Err(SqlError::Unsupported(_))));
        let sub = parse_query("SELECT * FROM (SELECT 1) s").unwrap();
        assert!(matches!(referenced_tables(&sub), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn test_stage_file_header() {
        let file = SqlStageFile::parse(
            "top_zones",
            "-- Top pickup zones\n-- lakeflow: materialize=replace\nSELECT zone FROM clean LIMIT 10\n",
        )
        .unwrap();
        assert_eq!(file.materialize, Materialization::Replace);
        assert_eq!(file.inputs(), ["clean".to_string()]);

        let plain = SqlStageFile::parse("t", "SELECT * FROM clean").unwrap();
        assert_eq!(plain.materialize, Materialization::Transient);

        let bad = SqlStageFile::parse("t", "-- lakeflow: materialize=merge\nSELECT * FROM clean");
        assert!(matches!(bad, Err(SqlError::Header(_))));
        let bad = SqlStageFile::parse("t", "-- lakeflow: owner=ada\nSELECT * FROM clean");
        assert!(matches!(bad, Err(SqlError::Header(_))));
    }
}
