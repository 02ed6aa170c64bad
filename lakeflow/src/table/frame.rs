//! The immutable row table shared between stages.

use super::{Column, DataType, Schema, TableError, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An immutable, schema-bearing collection of rows.
///
/// Every row holds exactly one value per column, of the column's type or
/// null where the column is nullable. Construction enforces this, so a
/// `Table` in hand is always well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawTable {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Self::new(raw.schema, raw.rows)
    }
}

impl Table {
    /// Creates a table, coercing values where the schema allows it.
    ///
    /// # Errors
    ///
    /// Returns an error if a row has the wrong number of values, a value has
    /// the wrong type, a float is infinite or NaN, or a non-nullable column
    /// holds a null.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, TableError> {
        let mut checked = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(TableError::ArityMismatch {
                    row: row_idx,
                    expected: schema.len(),
                    found: row.len(),
                });
            }
            let mut out = Vec::with_capacity(row.len());
            for (value, column) in row.into_iter().zip(schema.columns()) {
                out.push(check_value(value, column, row_idx)?);
            }
            checked.push(out);
        }
        Ok(Self {
            schema,
            rows: checked,
        })
    }

    /// Creates an empty table.
    #[must_use]
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Builds a table from named columns of values, inferring the schema.
    ///
    /// A column's type is the type of its first non-null value (integers
    /// widen to float if floats also appear); all-null columns are strings.
    ///
    /// # Errors
    ///
    /// Returns an error if columns have different lengths or mixed types.
    pub fn from_columns(columns: Vec<(&str, Vec<Value>)>) -> Result<Self, TableError> {
        let n_rows = columns.first().map_or(0, |(_, values)| values.len());
        let mut schema_columns = Vec::with_capacity(columns.len());
        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(TableError::InvalidOperation(format!(
                    "column '{name}' has {} values, expected {n_rows}",
                    values.len()
                )));
            }
            let data_type = infer_type(values.iter()).unwrap_or(DataType::Str);
            let mut column = Column::new(*name, data_type);
            if values.iter().any(Value::is_null) {
                column = column.nullable();
            }
            schema_columns.push(column);
        }
        let schema = Schema::new(schema_columns)?;

        let mut rows: Vec<Vec<Value>> = (0..n_rows).map(|_| Vec::with_capacity(columns.len())).collect();
        for (_, values) in columns {
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Self::new(schema, rows)
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Returns one row.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Iterates over the values of one column.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] if there is no such column.
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Value>, TableError> {
        let idx = self.schema.require(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Returns a single cell.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Consumes the table, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> (Schema, Vec<Vec<Value>>) {
        (self.schema, self.rows)
    }

    /// Appends the rows of `other`, which must have the same schema.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::SchemaMismatch`] if the schemas differ.
    pub fn append(&self, other: &Self) -> Result<Self, TableError> {
        if self.schema.names() != other.schema.names()
            || self
                .schema
                .columns()
                .iter()
                .zip(other.schema.columns())
                .any(|(a, b)| a.data_type != b.data_type)
        {
            return Err(TableError::SchemaMismatch(
                "appended rows must have the same columns and types".to_string(),
            ));
        }
        let columns = self
            .schema
            .columns()
            .iter()
            .zip(other.schema.columns())
            .map(|(a, b)| Column {
                nullable: a.nullable || b.nullable,
                ..a.clone()
            })
            .collect();
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Ok(Self {
            schema: Schema::new(columns)?,
            rows,
        })
    }

    /// SHA-256 over the canonical JSON encoding of schema and rows.
    ///
    /// Two tables with the same schema and the same rows in the same order
    /// always hash the same; this is the table's identity in the catalog.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing owned, well-formed data cannot fail.
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.update(bytes);
        }
        hex::encode(hasher.finalize())
    }

    /// Rows as JSON objects keyed by column name.
    #[must_use]
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, serde_json::Value> = self
                    .schema
                    .columns()
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(map)
            })
            .collect()
    }
}

fn check_value(value: Value, column: &Column, row: usize) -> Result<Value, TableError> {
    if value.is_null() {
        if column.nullable {
            return Ok(Value::Null);
        }
        return Err(TableError::NullInNonNullable {
            column: column.name.clone(),
            row,
        });
    }
    if let Value::Float(x) = value {
        if !x.is_finite() {
            return Err(TableError::NonFiniteFloat {
                column: column.name.clone(),
                row,
                value: x.to_string(),
            });
        }
    }
    let found = value.data_type();
    value.coerce(column.data_type).ok_or_else(|| TableError::TypeMismatch {
        column: column.name.clone(),
        expected: column.data_type,
        found: found.map_or_else(|| "null".to_string(), |t| t.to_string()),
    })
}

/// Infers a single type for a sequence of values, ignoring nulls.
pub(crate) fn infer_type<'a>(values: impl Iterator<Item = &'a Value>) -> Option<DataType> {
    let mut inferred: Option<DataType> = None;
    for value in values {
        let Some(t) = value.data_type() else { continue };
        inferred = Some(match (inferred, t) {
            (None, t) => t,
            (Some(DataType::Int), DataType::Float) | (Some(DataType::Float), DataType::Int) => {
                DataType::Float
            }
            (Some(prev), _) => prev,
        });
    }
    inferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("score", DataType::Float).nullable(),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_coerces_ints_to_floats() {
        let table = Table::new(schema(), vec![vec![Value::Int(1), Value::Int(2)]]).unwrap();
        assert_eq!(table.value(0, "score"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn test_table_rejects_bad_rows() {
        let arity = Table::new(schema(), vec![vec![Value::Int(1)]]);
        assert!(matches!(arity, Err(TableError::ArityMismatch { expected: 2, found: 1, .. })));

        let null = Table::new(schema(), vec![vec![Value::Null, Value::Null]]);
        assert!(matches!(null, Err(TableError::NullInNonNullable { row: 0, .. })));

        let typed = Table::new(schema(), vec![vec![Value::from("x"), Value::Null]]);
        assert!(matches!(typed, Err(TableError::TypeMismatch { .. })));
    }

    #[test]
    fn test_from_columns_infers_schema() {
        let table = Table::from_columns(vec![
            ("id", vec![Value::Int(1), Value::Int(2)]),
            ("x", vec![Value::Int(1), Value::Float(0.5)]),
            ("name", vec![Value::Null, Value::from("b")]),
        ])
        .unwrap();

        let columns = table.schema().columns();
        assert_eq!(columns[0], Column::new("id", DataType::Int));
        assert_eq!(columns[1], Column::new("x", DataType::Float));
        assert_eq!(columns[2], Column::new("name", DataType::Str).nullable());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = Table::new(schema(), vec![vec![Value::Int(1), Value::Float(0.5)]]).unwrap();
        let b = Table::new(schema(), vec![vec![Value::Int(1), Value::Float(0.5)]]).unwrap();
        let c = Table::new(schema(), vec![vec![Value::Int(2), Value::Float(0.5)]]).unwrap();

        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_append() {
        let a = Table::new(schema(), vec![vec![Value::Int(1), Value::Null]]).unwrap();
        let b = Table::new(schema(), vec![vec![Value::Int(2), Value::Float(1.0)]]).unwrap();
        let both = a.append(&b).unwrap();
        assert_eq!(both.num_rows(), 2);

        let other = Table::from_columns(vec![("id", vec![Value::Int(3)])]).unwrap();
        assert!(a.append(&other).is_err());
    }

    #[test]
    fn test_table_rejects_non_finite_floats() {
        for x in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = Table::new(schema(), vec![vec![Value::Int(1), Value::Float(x)]]).unwrap_err();
            assert!(matches!(err, TableError::NonFiniteFloat { row: 0, .. }), "{err}");
        }
        assert!(Table::from_columns(vec![("x", vec![Value::Float(f64::NAN)])]).is_err());
    }

    #[test]
    fn test_serde_validates_rows() {
        let table = Table::new(schema(), vec![vec![Value::Int(1), Value::Null]]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);

        let broken = r#"{"schema":[{"name":"id","type":"int"}],"rows":[["Null"]]}"#;
        assert!(serde_json::from_str::<Table>(broken).is_err());
    }
}
