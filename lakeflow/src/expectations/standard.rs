//! The standard expectation library.
//!
//! Every function checks one property of a table and returns whether it
//! holds. Nulls are ignored by the uniqueness, accepted-values and mean
//! checks; only the null checks look at them.

use crate::table::{DataType, Table, TableError, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// No value in `column` is null.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_no_nulls(table: &Table, column: &str) -> Result<bool, TableError> {
    Ok(!table.column_values(column)?.any(Value::is_null))
}

/// Every value in `column` is null. Holds for an empty table.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_all_null(table: &Table, column: &str) -> Result<bool, TableError> {
    Ok(table.column_values(column)?.all(Value::is_null))
}

/// At least one value in `column` is null.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_some_null(table: &Table, column: &str) -> Result<bool, TableError> {
    Ok(table.column_values(column)?.any(Value::is_null))
}

/// No non-null value in `column` appears twice.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_all_unique(table: &Table, column: &str) -> Result<bool, TableError> {
    let mut seen = HashSet::new();
    Ok(table
        .column_values(column)?
        .filter(|v| !v.is_null())
        .all(|v| seen.insert(v)))
}

/// Some non-null value in `column` appears at least twice.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_not_unique(table: &Table, column: &str) -> Result<bool, TableError> {
    expect_column_all_unique(table, column).map(|unique| !unique)
}

/// Every non-null value in `column` equals one of `accepted`.
///
/// Numbers compare by value, so `Int(1)` is accepted by `Float(1.0)`.
///
/// # Errors
///
/// Returns [`TableError::ColumnNotFound`] if the column does not exist.
pub fn expect_column_accepted_values(table: &Table, column: &str, accepted: &[Value]) -> Result<bool, TableError> {
    Ok(table
        .column_values(column)?
        .filter(|v| !v.is_null())
        .all(|v| accepted.iter().any(|a| v.compare(a) == Some(Ordering::Equal))))
}

/// The mean of `column` is strictly greater than `value`. Fails when the
/// column has no non-null values.
///
/// # Errors
///
/// Returns an error if the column is missing or not numeric.
pub fn expect_column_mean_greater_than(table: &Table, column: &str, value: f64) -> Result<bool, TableError> {
    Ok(column_mean(table, column)?.is_some_and(|mean| mean > value))
}

/// The mean of `column` is strictly smaller than `value`. Fails when the
/// column has no non-null values.
///
/// # Errors
///
/// Returns an error if the column is missing or not numeric.
pub fn expect_column_mean_smaller_than(table: &Table, column: &str, value: f64) -> Result<bool, TableError> {
    Ok(column_mean(table, column)?.is_some_and(|mean| mean < value))
}

/// The table has between `min` and `max` rows, inclusive.
#[must_use]
pub fn expect_row_count_between(table: &Table, min: usize, max: usize) -> bool {
    (min..=max).contains(&table.num_rows())
}

#[allow(clippy::cast_precision_loss)]
fn column_mean(table: &Table, column: &str) -> Result<Option<f64>, TableError> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in table.column_values(column)? {
        if value.is_null() {
            continue;
        }
        let Some(number) = value.as_f64() else {
            return Err(TableError::TypeMismatch {
                column: column.to_string(),
                expected: DataType::Float,
                found: value.data_type().map_or_else(|| "null".to_string(), |t| t.to_string()),
            });
        };
        sum += number;
        count += 1;
    }
    Ok((count > 0).then(|| sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("id", vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(3)]),
            ("fare", vec![Value::Float(10.0), Value::Null, Value::Float(20.0), Value::Float(30.0)]),
            ("zone", vec![
                Value::Str("Queens".into()),
                Value::Str("Bronx".into()),
                Value::Null,
                Value::Str("Queens".into()),
            ]),
        ])
        .unwrap()
    }

    #[test]
    fn test_null_checks() {
        let t = sample();
        assert!(expect_column_no_nulls(&t, "id").unwrap());
        assert!(!expect_column_no_nulls(&t, "fare").unwrap());
        assert!(expect_column_some_null(&t, "zone").unwrap());
        assert!(!expect_column_all_null(&t, "zone").unwrap());
        assert!(expect_column_no_nulls(&t, "missing").is_err());
    }

    #[test]
    fn test_all_null_on_empty_table() {
        let t = Table::from_columns(vec![("x", vec![])]).unwrap();
        assert!(expect_column_all_null(&t, "x").unwrap());
        assert!(!expect_column_some_null(&t, "x").unwrap());
    }

    #[test]
    fn test_uniqueness() {
        let t = sample();
        assert!(!expect_column_all_unique(&t, "id").unwrap());
        assert!(expect_column_not_unique(&t, "id").unwrap());
        assert!(expect_column_all_unique(&t, "fare").unwrap());
    }

    #[test]
    fn test_accepted_values() {
        let t = sample();
        let boroughs = [Value::Str("Queens".into()), Value::Str("Bronx".into())];
        assert!(expect_column_accepted_values(&t, "zone", &boroughs).unwrap());
        assert!(!expect_column_accepted_values(&t, "zone", &boroughs[..1]).unwrap());
        assert!(expect_column_accepted_values(&t, "id", &[Value::Float(1.0), Value::Int(2), Value::Int(3)]).unwrap());
    }

    #[test]
    fn test_means() {
        let t = sample();
        assert!(expect_column_mean_greater_than(&t, "fare", 19.0).unwrap());
        assert!(!expect_column_mean_greater_than(&t, "fare", 20.0).unwrap());
        assert!(expect_column_mean_smaller_than(&t, "id", 3.0).unwrap());
        assert!(expect_column_mean_greater_than(&t, "zone", 0.0).is_err());

        let empty = Table::from_columns(vec![("x", vec![Value::Null])]).unwrap();
        assert!(!expect_column_mean_greater_than(&empty, "x", f64::MIN).unwrap());
    }

    #[test]
    fn test_row_count_between() {
        let t = sample();
        assert!(expect_row_count_between(&t, 4, 4));
        assert!(expect_row_count_between(&t, 0, 10));
        assert!(!expect_row_count_between(&t, 5, 10));
    }
}
