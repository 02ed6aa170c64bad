//! Building tables from JSON documents.
//!
//! Accepts either a JSON array of objects or newline-delimited objects.
//! Columns appear in order of first appearance across rows (keys within one
//! object in sorted order); a key missing from a row reads as null.

use super::{value::parse_timestamp, Column, DataType, Schema, Table, TableError, Value};
use std::collections::HashMap;

static NULL: Value = Value::Null;

impl Table {
    /// Parses a JSON array of objects, or NDJSON, inferring the schema.
    ///
    /// Integers and floats unify to float; strings that all parse as
    /// timestamps become a timestamp column.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Json`] for malformed input, non-object rows, or
    /// nested values, and a type error when a column mixes types.
    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let trimmed = text.trim_start();
        let records: Vec<serde_json::Value> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).map_err(|e| TableError::Json(e.to_string()))?
        } else {
            trimmed
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).map_err(|e| TableError::Json(e.to_string())))
                .collect::<Result<_, _>>()?
        };
        Self::from_json_records(&records)
    }

    /// Builds a table from JSON objects, inferring the schema.
    ///
    /// # Errors
    ///
    /// See [`Table::from_json_str`].
    pub fn from_json_records(records: &[serde_json::Value]) -> Result<Self, TableError> {
        let mut names: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<HashMap<usize, Value>> = Vec::with_capacity(records.len());

        for (row_idx, record) in records.iter().enumerate() {
            let serde_json::Value::Object(map) = record else {
                return Err(TableError::Json(format!("row {row_idx} is not an object")));
            };
            let mut row = HashMap::with_capacity(map.len());
            for (key, raw) in map {
                let value = Value::from_json(raw).ok_or_else(|| {
                    TableError::Json(format!("row {row_idx}: nested value in column '{key}'"))
                })?;
                let pos = *positions.entry(key.clone()).or_insert_with(|| {
                    names.push(key.clone());
                    names.len() - 1
                });
                row.insert(pos, value);
            }
            cells.push(row);
        }

        let columns = names
            .iter()
            .enumerate()
            .map(|(pos, name)| {
                let values = cells.iter().map(|row| row.get(&pos).unwrap_or(&NULL));
                infer_column(name, values)
            })
            .collect();
        let schema = Schema::new(columns)?;

        let rows = cells
            .into_iter()
            .map(|mut row| {
                (0..names.len())
                    .map(|pos| row.remove(&pos).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::new(schema, rows)
    }
}

fn infer_column<'a>(name: &str, values: impl Iterator<Item = &'a Value> + Clone) -> Column {
    let nullable = values.clone().any(Value::is_null);
    let strings: Vec<&str> = values.clone().filter_map(Value::as_str).collect();
    let data_type = if !strings.is_empty()
        && values.clone().all(|v| v.is_null() || v.as_str().is_some())
        && strings.iter().all(|s| parse_timestamp(s).is_some())
    {
        DataType::Timestamp
    } else {
        super::frame::infer_type(values).unwrap_or(DataType::Str)
    };
    let column = Column::new(name, data_type);
    if nullable {
        column.nullable()
    } else {
        column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_input() {
        let table = Table::from_json_str(
            r#"[{"id": 1, "ts": "2024-01-01T10:00:00Z", "v": 1.5},
                {"id": 2, "ts": null, "v": 2}]"#,
        )
        .unwrap();

        assert_eq!(table.num_rows(), 2);
        let ts = table.schema().column("ts").unwrap();
        assert_eq!(ts.data_type, DataType::Timestamp);
        assert!(ts.nullable);
        assert_eq!(table.schema().column("v").unwrap().data_type, DataType::Float);
        assert_eq!(table.value(1, "v"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn test_ndjson_with_missing_keys() {
        let table = Table::from_json_str("{\"a\": \"x\"}\n\n{\"b\": true}\n").unwrap();
        assert_eq!(table.schema().names(), vec!["a", "b"]);
        assert_eq!(table.value(0, "b"), Some(&Value::Null));
        assert_eq!(table.value(1, "b"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_rejects_nested_and_mixed() {
        assert!(matches!(
            Table::from_json_str(r#"[{"a": [1, 2]}]"#),
            Err(TableError::Json(_))
        ));
        assert!(Table::from_json_str(r#"[{"a": 1}, {"a": "x"}]"#).is_err());
        assert!(Table::from_json_str(r"[1, 2]").is_err());
    }
}
