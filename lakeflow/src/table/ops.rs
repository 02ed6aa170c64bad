//! Declarative table operations.
//!
//! A [`TableOp`] maps one table (plus, for joins, a second named input) to a
//! new table. Descriptor-defined stages are a list of these applied in order.

use super::{Column, DataType, Schema, Table, TableError, Value};
use crate::context::Parameters;
use chrono::{DurationRound, TimeDelta};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Comparison operators for [`TableOp::Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Applies the operator to an ordering. Incomparable values never match.
    #[must_use]
    pub fn matches(self, ordering: Option<Ordering>) -> bool {
        let Some(ord) = ordering else { return false };
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

/// Units for timestamp truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Whole seconds.
    Second,
    /// Whole minutes.
    Minute,
    /// Whole hours.
    Hour,
    /// Whole UTC days.
    Day,
}

impl TimeUnit {
    /// Parses a unit name such as `"hour"`, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "second" => Some(Self::Second),
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            _ => None,
        }
    }

    fn delta(self) -> TimeDelta {
        match self {
            Self::Second => TimeDelta::seconds(1),
            Self::Minute => TimeDelta::minutes(1),
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }

    /// Truncates a timestamp value; nulls stay null.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidOperation`] for non-timestamp values.
    pub fn truncate(self, value: &Value) -> Result<Value, TableError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Timestamp(ts) => ts
                .duration_trunc(self.delta())
                .map(Value::Timestamp)
                .map_err(|e| TableError::InvalidOperation(format!("cannot truncate {ts}: {e}"))),
            other => Err(TableError::InvalidOperation(format!(
                "cannot truncate non-timestamp value {other}"
            ))),
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    /// Number of rows, or of non-null values when a column is given.
    Count,
    /// Sum of non-null values.
    Sum,
    /// Mean of non-null values.
    Mean,
    /// Minimum non-null value.
    Min,
    /// Maximum non-null value.
    Max,
}

/// One aggregated output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Function to apply.
    pub op: AggregateOp,
    /// Input column; only `count` may omit it.
    #[serde(default)]
    pub column: Option<String>,
    /// Output column name.
    pub output: String,
}

impl AggregateSpec {
    /// Creates an aggregate over a column.
    #[must_use]
    pub fn new(op: AggregateOp, column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op,
            column: Some(column.into()),
            output: output.into(),
        }
    }

    /// Creates a `count(*)` aggregate.
    #[must_use]
    pub fn count_rows(output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Count,
            column: None,
            output: output.into(),
        }
    }
}

/// A single declarative table operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOp {
    /// Keep only the listed columns, in the given order.
    Select {
        /// Columns to keep.
        columns: Vec<String>,
    },
    /// Drop rows with a null in any of the columns (all columns if empty).
    DropNulls {
        /// Columns to check.
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Keep rows where `column <cmp> value`.
    Filter {
        /// Column to test.
        column: String,
        /// Comparison.
        cmp: CompareOp,
        /// Right-hand constant.
        value: serde_json::Value,
    },
    /// Truncate a timestamp column.
    Truncate {
        /// Timestamp column.
        column: String,
        /// Truncation unit.
        unit: TimeUnit,
        /// Output column; replaces `column` when absent.
        #[serde(default)]
        output: Option<String>,
    },
    /// Inner equi-join with another declared input.
    Join {
        /// Artifact name of the right-hand table.
        right: String,
        /// Key column on this table.
        left_on: String,
        /// Key column on the right-hand table.
        right_on: String,
    },
    /// Group by key columns and aggregate.
    Aggregate {
        /// Grouping columns.
        #[serde(default)]
        group_by: Vec<String>,
        /// Aggregated outputs.
        aggregates: Vec<AggregateSpec>,
    },
    /// Stable sort by one column; nulls sort last.
    Sort {
        /// Sort key.
        by: String,
        /// Descending order.
        #[serde(default)]
        descending: bool,
    },
    /// Keep the first `n` rows.
    Limit {
        /// Row count.
        n: usize,
    },
    /// Keep `n` rows chosen by a seeded generator, in their original order.
    Sample {
        /// Row count.
        n: usize,
        /// Generator seed.
        #[serde(default)]
        seed: u64,
    },
    /// Append a constant column.
    WithColumn {
        /// New column name.
        name: String,
        /// Constant value.
        value: serde_json::Value,
    },
    /// Append a column holding the value of a run parameter.
    WithParameter {
        /// New column name; defaults to the parameter name.
        #[serde(default)]
        name: Option<String>,
        /// Parameter to read.
        parameter: String,
    },
}

impl TableOp {
    /// Artifact names this operation reads besides its input table.
    #[must_use]
    pub fn extra_inputs(&self) -> Vec<&str> {
        match self {
            Self::Join { right, .. } => vec![right.as_str()],
            _ => Vec::new(),
        }
    }

    /// Applies the operation.
    ///
    /// `lookup` resolves the extra inputs named by [`TableOp::extra_inputs`];
    /// `parameters` are the run parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced column, input or parameter is missing
    /// or has an unsuitable type.
    pub fn apply(
        &self,
        table: &Table,
        lookup: &dyn Fn(&str) -> Option<Arc<Table>>,
        parameters: &Parameters,
    ) -> Result<Table, TableError> {
        match self {
            Self::Select { columns } => select(table, columns),
            Self::DropNulls { columns } => drop_nulls(table, columns),
            Self::Filter { column, cmp, value } => {
                let rhs = Value::from_json(value).ok_or_else(|| {
                    TableError::InvalidOperation(format!("filter value for '{column}' must be a scalar"))
                })?;
                filter(table, column, *cmp, &rhs)
            }
            Self::Truncate {
                column,
                unit,
                output,
            } => truncate(table, column, *unit, output.as_deref().unwrap_or(column)),
            Self::Join {
                right,
                left_on,
                right_on,
            } => {
                let right_table = lookup(right).ok_or_else(|| {
                    TableError::InvalidOperation(format!("join input '{right}' is not available"))
                })?;
                inner_join(table, &right_table, left_on, right_on)
            }
            Self::Aggregate {
                group_by,
                aggregates,
            } => aggregate(table, group_by, aggregates),
            Self::Sort { by, descending } => sort(table, by, *descending),
            Self::Limit { n } => limit(table, *n),
            Self::Sample { n, seed } => Ok(sample(table, *n, *seed)),
            Self::WithColumn { name, value } => {
                let value = Value::from_json(value).ok_or_else(|| {
                    TableError::InvalidOperation(format!("value for column '{name}' must be a scalar"))
                })?;
                with_column(table, name, value)
            }
            Self::WithParameter { name, parameter } => {
                let param = parameters.get(parameter).ok_or_else(|| {
                    TableError::InvalidOperation(format!("parameter '{parameter}' is not set"))
                })?;
                let value = param.to_value().ok_or_else(|| {
                    TableError::InvalidOperation(format!("parameter '{parameter}' is a secret"))
                })?;
                with_column(table, name.as_deref().unwrap_or(parameter), value)
            }
        }
    }
}

/// Keeps the listed columns.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] for unknown columns.
pub fn select(table: &Table, columns: &[String]) -> Result<Table, TableError> {
    let indices = columns
        .iter()
        .map(|c| table.schema().require(c))
        .collect::<Result<Vec<_>, _>>()?;
    let schema = Schema::new(
        indices
            .iter()
            .map(|&i| table.schema().columns()[i].clone())
            .collect(),
    )?;
    let rows = table
        .rows()
        .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Table::new(schema, rows)
}

/// Drops rows holding a null in any of `columns` (every column when empty).
///
/// The checked columns become non-nullable in the output.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] for unknown columns.
pub fn drop_nulls(table: &Table, columns: &[String]) -> Result<Table, TableError> {
    let indices: Vec<usize> = if columns.is_empty() {
        (0..table.num_columns()).collect()
    } else {
        columns
            .iter()
            .map(|c| table.schema().require(c))
            .collect::<Result<_, _>>()?
    };
    let schema = Schema::new(
        table
            .schema()
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| Column {
                nullable: c.nullable && !indices.contains(&i),
                ..c.clone()
            })
            .collect(),
    )?;
    let rows = table
        .rows()
        .filter(|row| indices.iter().all(|&i| !row[i].is_null()))
        .map(<[Value]>::to_vec)
        .collect();
    Table::new(schema, rows)
}

/// Keeps rows where `column <cmp> value`; nulls never match.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] for an unknown column.
pub fn filter(table: &Table, column: &str, cmp: CompareOp, value: &Value) -> Result<Table, TableError> {
    let idx = table.schema().require(column)?;
    let target = table.schema().columns()[idx].data_type;
    let rhs = value.clone().coerce(target).unwrap_or_else(|| value.clone());
    let rows = table
        .rows()
        .filter(|row| cmp.matches(row[idx].compare(&rhs)))
        .map(<[Value]>::to_vec)
        .collect();
    Table::new(table.schema().clone(), rows)
}

/// Writes the truncated timestamps of `column` into `output`.
///
/// # Errors
///
/// Returns an error if `column` is missing or not a timestamp column.
pub fn truncate(table: &Table, column: &str, unit: TimeUnit, output: &str) -> Result<Table, TableError> {
    let idx = table.schema().require(column)?;
    let source = &table.schema().columns()[idx];
    if source.data_type != DataType::Timestamp {
        return Err(TableError::InvalidOperation(format!(
            "cannot truncate column '{column}' of type {}",
            source.data_type
        )));
    }
    let mut columns = table.schema().columns().to_vec();
    let out_idx = if let Some(existing) = table.schema().index_of(output) {
        columns[existing] = source.clone().renamed(output);
        existing
    } else {
        columns.push(source.clone().renamed(output));
        columns.len() - 1
    };
    let mut rows = Vec::with_capacity(table.num_rows());
    for row in table.rows() {
        let mut out = row.to_vec();
        let truncated = unit.truncate(&row[idx])?;
        if out_idx == out.len() {
            out.push(truncated);
        } else {
            out[out_idx] = truncated;
        }
        rows.push(out);
    }
    Table::new(Schema::new(columns)?, rows)
}

/// Inner equi-join. Output columns are the left columns followed by the
/// right columns minus the right key; clashing right names get `_right`.
/// Null keys never match.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] for unknown key columns.
pub fn inner_join(left: &Table, right: &Table, left_on: &str, right_on: &str) -> Result<Table, TableError> {
    let li = left.schema().require(left_on)?;
    let ri = right.schema().require(right_on)?;

    let mut columns = left.schema().columns().to_vec();
    let right_keep: Vec<usize> = (0..right.num_columns()).filter(|&i| i != ri).collect();
    for &i in &right_keep {
        let column = right.schema().columns()[i].clone();
        if left.schema().index_of(&column.name).is_some() {
            let name = format!("{}_right", column.name);
            columns.push(column.renamed(name));
        } else {
            columns.push(column);
        }
    }

    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (pos, row) in right.rows().enumerate() {
        if let Some(key) = JoinKey::of(&row[ri]) {
            index.entry(key).or_default().push(pos);
        }
    }

    let mut rows = Vec::new();
    for lrow in left.rows() {
        let Some(key) = JoinKey::of(&lrow[li]) else { continue };
        let Some(matches) = index.get(&key) else { continue };
        for &pos in matches {
            if let Some(rrow) = right.row(pos) {
                let mut out = lrow.to_vec();
                out.extend(right_keep.iter().map(|&i| rrow[i].clone()));
                rows.push(out);
            }
        }
    }
    Table::new(Schema::new(columns)?, rows)
}

/// Join keys compare ints and integral floats alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Int(i64),
    Other(Value),
}

impl JoinKey {
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp, clippy::cast_precision_loss)]
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Float(f) if f.fract() == 0.0 && (*f as i64) as f64 == *f => Some(Self::Int(*f as i64)),
            other => Some(Self::Other(other.clone())),
        }
    }
}

/// Groups by `group_by` (in first-appearance order) and computes aggregates.
///
/// With no grouping columns the result is a single row, even for an empty
/// input.
///
/// # Errors
///
/// Returns an error for unknown columns or non-numeric `sum`/`mean` inputs.
pub fn aggregate(table: &Table, group_by: &[String], aggregates: &[AggregateSpec]) -> Result<Table, TableError> {
    let key_idx = group_by
        .iter()
        .map(|c| table.schema().require(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns: Vec<Column> = key_idx
        .iter()
        .map(|&i| table.schema().columns()[i].clone())
        .collect();
    let mut inputs = Vec::with_capacity(aggregates.len());
    for spec in aggregates {
        let input = match &spec.column {
            Some(name) => Some(table.schema().require(name)?),
            None if spec.op == AggregateOp::Count => None,
            None => {
                return Err(TableError::InvalidOperation(format!(
                    "aggregate '{}' needs an input column",
                    spec.output
                )))
            }
        };
        let input_type = input.map(|i| table.schema().columns()[i].data_type);
        columns.push(output_column(spec, input_type)?);
        inputs.push(input);
    }

    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for (pos, row) in table.rows().enumerate() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(pos);
    }
    if key_idx.is_empty() && order.is_empty() {
        order.push(Vec::new());
        groups.insert(Vec::new(), Vec::new());
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let members = groups.get(&key).map(Vec::as_slice).unwrap_or_default();
        let mut row = key;
        for (spec, input) in aggregates.iter().zip(&inputs) {
            let values: Vec<&Value> = match input {
                Some(i) => members
                    .iter()
                    .filter_map(|&pos| table.row(pos).map(|r| &r[*i]))
                    .filter(|v| !v.is_null())
                    .collect(),
                None => Vec::new(),
            };
            row.push(reduce(spec.op, &values, input.is_none().then_some(members.len()))?);
        }
        rows.push(row);
    }
    Table::new(Schema::new(columns)?, rows)
}

fn output_column(spec: &AggregateSpec, input_type: Option<DataType>) -> Result<Column, TableError> {
    let require_numeric = |t: Option<DataType>| match t {
        Some(t) if t.is_numeric() => Ok(t),
        _ => Err(TableError::InvalidOperation(format!(
            "aggregate '{}' needs a numeric column",
            spec.output
        ))),
    };
    Ok(match spec.op {
        AggregateOp::Count => Column::new(&spec.output, DataType::Int),
        AggregateOp::Sum => Column::new(&spec.output, require_numeric(input_type)?),
        AggregateOp::Mean => Column::new(&spec.output, {
            require_numeric(input_type)?;
            DataType::Float
        })
        .nullable(),
        AggregateOp::Min | AggregateOp::Max => {
            Column::new(&spec.output, input_type.unwrap_or(DataType::Str)).nullable()
        }
    })
}

/// Folds the non-null `values` of one group.
///
/// # Errors
///
/// Returns [`TableError::Overflow`] when an integer sum leaves the `i64`
/// range or a float sum or mean is not finite.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub(crate) fn reduce(op: AggregateOp, values: &[&Value], row_count: Option<usize>) -> Result<Value, TableError> {
    Ok(match op {
        AggregateOp::Count => Value::Int(row_count.unwrap_or(values.len()) as i64),
        AggregateOp::Sum => {
            if values.iter().all(|v| v.as_i64().is_some()) {
                let total = values
                    .iter()
                    .filter_map(|v| v.as_i64())
                    .try_fold(0_i64, i64::checked_add)
                    .ok_or_else(|| TableError::Overflow("integer sum".to_string()))?;
                Value::Int(total)
            } else {
                Value::Float(finite(values.iter().filter_map(|v| v.as_f64()).sum(), "float sum")?)
            }
        }
        AggregateOp::Mean => {
            if values.is_empty() {
                Value::Null
            } else {
                let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
                Value::Float(finite(total / values.len() as f64, "mean")?)
            }
        }
        AggregateOp::Min => values
            .iter()
            .min_by(|a, b| a.sort_cmp(b))
            .map_or(Value::Null, |v| (*v).clone()),
        AggregateOp::Max => values
            .iter()
            .max_by(|a, b| a.sort_cmp(b))
            .map_or(Value::Null, |v| (*v).clone()),
    })
}

fn finite(x: f64, what: &str) -> Result<f64, TableError> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(TableError::Overflow(format!("{what} is {x}")))
    }
}

/// Stable sort by one column; nulls last in both directions.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] for an unknown column.
pub fn sort(table: &Table, by: &str, descending: bool) -> Result<Table, TableError> {
    let idx = table.schema().require(by)?;
    let mut rows: Vec<Vec<Value>> = table.rows().map(<[Value]>::to_vec).collect();
    rows.sort_by(|a, b| match (a[idx].is_null(), b[idx].is_null()) {
        (false, false) if descending => b[idx].sort_cmp(&a[idx]),
        _ => a[idx].sort_cmp(&b[idx]),
    });
    Table::new(table.schema().clone(), rows)
}

/// Keeps the first `n` rows.
///
/// # Errors
///
/// Never fails for a well-formed table; kept fallible for uniformity.
pub fn limit(table: &Table, n: usize) -> Result<Table, TableError> {
    let rows = table.rows().take(n).map(<[Value]>::to_vec).collect();
    Table::new(table.schema().clone(), rows)
}

/// Keeps `n` rows picked by a generator seeded with `seed`, preserving order.
#[must_use]
pub fn sample(table: &Table, n: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, table.num_rows(), n.min(table.num_rows())).into_vec();
    picked.sort_unstable();
    let rows = picked
        .into_iter()
        .filter_map(|i| table.row(i).map(<[Value]>::to_vec))
        .collect();
    Table::new(table.schema().clone(), rows).unwrap_or_else(|_| Table::empty(table.schema().clone()))
}

/// Appends a constant column.
///
/// # Errors
///
/// Returns [`TableError::DuplicateColumn`] if the name is taken.
pub fn with_column(table: &Table, name: &str, value: Value) -> Result<Table, TableError> {
    let column = match value.data_type() {
        Some(t) => Column::new(name, t),
        None => Column::new(name, DataType::Str).nullable(),
    };
    let mut columns = table.schema().columns().to_vec();
    columns.push(column);
    let schema = Schema::new(columns)?;
    let rows = table
        .rows()
        .map(|row| {
            let mut out = row.to_vec();
            out.push(value.clone());
            out
        })
        .collect();
    Table::new(schema, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParamValue;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn ts(h: u32, m: u32) -> Value {
        Value::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).single().unwrap())
    }

    fn events() -> Table {
        Table::from_columns(vec![
            ("id", vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
            ("ts", vec![ts(10, 5), Value::Null, ts(10, 40), ts(11, 1)]),
            ("zone", vec![Value::Int(7), Value::Int(7), Value::Int(8), Value::Int(9)]),
        ])
        .unwrap()
    }

    fn zones() -> Table {
        Table::from_columns(vec![
            ("LocationID", vec![Value::Int(7), Value::Int(8)]),
            ("Zone", vec![Value::from("Astoria"), Value::from("Bronx Park")]),
        ])
        .unwrap()
    }

    fn no_lookup(_: &str) -> Option<Arc<Table>> {
        None
    }

    #[test]
    fn test_drop_nulls_then_truncate_then_count() {
        let clean = drop_nulls(&events(), &["ts".to_string()]).unwrap();
        assert_eq!(clean.num_rows(), 3);
        assert!(!clean.schema().column("ts").unwrap().nullable);

        let hourly = truncate(&clean, "ts", TimeUnit::Hour, "hour").unwrap();
        let counts = aggregate(
            &hourly,
            &["hour".to_string()],
            &[AggregateSpec::count_rows("n")],
        )
        .unwrap();

        assert_eq!(counts.num_rows(), 2);
        assert_eq!(counts.value(0, "hour"), Some(&ts(10, 0)));
        assert_eq!(counts.value(0, "n"), Some(&Value::Int(2)));
        assert_eq!(counts.value(1, "n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let joined = inner_join(&events(), &zones(), "zone", "LocationID").unwrap();
        assert_eq!(joined.num_rows(), 3);
        assert_eq!(joined.schema().names(), vec!["id", "ts", "zone", "Zone"]);
        assert_eq!(joined.value(2, "Zone"), Some(&Value::from("Bronx Park")));
    }

    #[test]
    fn test_join_renames_clashing_columns() {
        let right = Table::from_columns(vec![
            ("key", vec![Value::Int(1)]),
            ("id", vec![Value::from("r")]),
        ])
        .unwrap();
        let joined = inner_join(&events(), &right, "id", "key").unwrap();
        assert_eq!(joined.schema().names(), vec!["id", "ts", "zone", "id_right"]);
    }

    #[test]
    fn test_filter_and_sort() {
        let filtered = filter(&events(), "zone", CompareOp::Ge, &Value::Int(8)).unwrap();
        assert_eq!(filtered.num_rows(), 2);

        let sorted = sort(&events(), "ts", true).unwrap();
        assert_eq!(sorted.value(0, "id"), Some(&Value::Int(4)));
        assert_eq!(sorted.value(3, "id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_aggregate_numeric_ops() {
        let table = Table::from_columns(vec![
            ("g", vec![Value::from("a"), Value::from("a"), Value::from("b")]),
            ("x", vec![Value::Int(1), Value::Int(3), Value::Null]),
        ])
        .unwrap();
        let out = aggregate(
            &table,
            &["g".to_string()],
            &[
                AggregateSpec::new(AggregateOp::Sum, "x", "total"),
                AggregateSpec::new(AggregateOp::Mean, "x", "avg"),
                AggregateSpec::new(AggregateOp::Count, "x", "non_null"),
                AggregateSpec::new(AggregateOp::Max, "x", "top"),
            ],
        )
        .unwrap();

        assert_eq!(out.row(0).unwrap(), &[
            Value::from("a"),
            Value::Int(4),
            Value::Float(2.0),
            Value::Int(2),
            Value::Int(3)
        ]);
        assert_eq!(out.row(1).unwrap(), &[
            Value::from("b"),
            Value::Int(0),
            Value::Null,
            Value::Int(0),
            Value::Null
        ]);
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let table = Table::from_columns(vec![("x", vec![Value::Int(i64::MAX), Value::Int(1)])]).unwrap();
        let err = aggregate(&table, &[], &[AggregateSpec::new(AggregateOp::Sum, "x", "total")]).unwrap_err();
        assert!(matches!(err, TableError::Overflow(_)));

        let table = Table::from_columns(vec![("x", vec![Value::Float(f64::MAX), Value::Float(f64::MAX)])]).unwrap();
        let err = aggregate(&table, &[], &[AggregateSpec::new(AggregateOp::Sum, "x", "total")]).unwrap_err();
        assert!(matches!(err, TableError::Overflow(_)));
    }

    #[test]
    fn test_global_aggregate_on_empty_input() {
        let empty = Table::empty(events().schema().clone());
        let out = aggregate(&empty, &[], &[AggregateSpec::count_rows("n")]).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.value(0, "n"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_sample_is_deterministic() {
        let a = sample(&events(), 2, 42);
        let b = sample(&events(), 2, 42);
        assert_eq!(a, b);
        assert_eq!(a.num_rows(), 2);
        assert_eq!(sample(&events(), 10, 1).num_rows(), 4);
    }

    #[test]
    fn test_ops_deserialize_from_toml() {
        let ops: HashMap<String, Vec<TableOp>> = toml::from_str(
            r#"
            ops = [
                { op = "drop_nulls", columns = ["ts"] },
                { op = "truncate", column = "ts", unit = "hour", output = "hour" },
                { op = "aggregate", group_by = ["hour"], aggregates = [{ op = "count", output = "n" }] },
            ]
            "#,
        )
        .unwrap();
        let ops = &ops["ops"];
        assert_eq!(ops.len(), 3);

        let mut table = events();
        for op in ops {
            table = op.apply(&table, &no_lookup, &Parameters::new()).unwrap();
        }
        assert_eq!(table.schema().names(), vec!["hour", "n"]);
    }

    #[test]
    fn test_join_op_requires_lookup() {
        let op = TableOp::Join {
            right: "zones".to_string(),
            left_on: "zone".to_string(),
            right_on: "LocationID".to_string(),
        };
        assert_eq!(op.extra_inputs(), vec!["zones"]);
        assert!(op.apply(&events(), &no_lookup, &Parameters::new()).is_err());

        let z = Arc::new(zones());
        let lookup = move |name: &str| (name == "zones").then(|| Arc::clone(&z));
        assert_eq!(op.apply(&events(), &lookup, &Parameters::new()).unwrap().num_rows(), 3);
    }

    #[test]
    fn test_with_parameter() {
        let op: TableOp = toml::from_str(r#"op = "with_parameter"
parameter = "run_id""#).unwrap();
        assert!(op.apply(&events(), &no_lookup, &Parameters::new()).is_err());

        let parameters = Parameters::from([("run_id".to_string(), ParamValue::Int(7))]);
        let out = op.apply(&events(), &no_lookup, &parameters).unwrap();
        assert!(out.column_values("run_id").unwrap().all(|v| *v == Value::Int(7)));

        let secret = Parameters::from([("run_id".to_string(), ParamValue::Secret("k".to_string()))]);
        assert!(op.apply(&events(), &no_lookup, &secret).is_err());
    }
}
