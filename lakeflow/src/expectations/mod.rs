//! Data-quality expectations.
//!
//! An expectation is a stage that reads exactly one input and reports
//! whether a property holds. Its one-row output `{expectation, passed}` is
//! never persisted; the runner reads `passed` and applies the stage's
//! [`ExpectationPolicy`](crate::core::ExpectationPolicy).

mod stage;
pub mod standard;

pub use stage::ExpectationStage;

use crate::table::{Table, TableError, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declarative check, as written in a project descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// No nulls in `column`.
    NoNulls {
        /// Checked column.
        column: String,
    },
    /// Only nulls in `column`.
    AllNull {
        /// Checked column.
        column: String,
    },
    /// At least one null in `column`.
    SomeNull {
        /// Checked column.
        column: String,
    },
    /// No repeated values in `column`.
    AllUnique {
        /// Checked column.
        column: String,
    },
    /// Some repeated value in `column`.
    NotUnique {
        /// Checked column.
        column: String,
    },
    /// Every value of `column` is one of `values`.
    AcceptedValues {
        /// Checked column.
        column: String,
        /// Allowed values, as plain JSON/TOML scalars.
        values: Vec<serde_json::Value>,
    },
    /// The mean of `column` exceeds `value`.
    MeanGreaterThan {
        /// Checked column.
        column: String,
        /// Exclusive lower bound.
        value: f64,
    },
    /// The mean of `column` is below `value`.
    MeanSmallerThan {
        /// Checked column.
        column: String,
        /// Exclusive upper bound.
        value: f64,
    },
    /// The row count lies in `min..=max`.
    RowCountBetween {
        /// Inclusive minimum.
        min: usize,
        /// Inclusive maximum.
        max: usize,
    },
}

impl Check {
    /// Evaluates the check.
    ///
    /// # Errors
    ///
    /// Returns an error if the checked column is missing, has the wrong
    /// type, or an accepted value is not a scalar.
    pub fn evaluate(&self, table: &Table) -> Result<bool, TableError> {
        match self {
            Self::NoNulls { column } => standard::expect_column_no_nulls(table, column),
            Self::AllNull { column } => standard::expect_column_all_null(table, column),
            Self::SomeNull { column } => standard::expect_column_some_null(table, column),
            Self::AllUnique { column } => standard::expect_column_all_unique(table, column),
            Self::NotUnique { column } => standard::expect_column_not_unique(table, column),
            Self::AcceptedValues { column, values } => {
                let accepted = values
                    .iter()
                    .map(|v| {
                        Value::from_json(v)
                            .ok_or_else(|| TableError::InvalidOperation(format!("'{v}' is not an accepted value")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                standard::expect_column_accepted_values(table, column, &accepted)
            }
            Self::MeanGreaterThan { column, value } => standard::expect_column_mean_greater_than(table, column, *value),
            Self::MeanSmallerThan { column, value } => standard::expect_column_mean_smaller_than(table, column, *value),
            Self::RowCountBetween { min, max } => Ok(standard::expect_row_count_between(table, *min, *max)),
        }
    }

    /// The checked column, if the check looks at one.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::NoNulls { column }
            | Self::AllNull { column }
            | Self::SomeNull { column }
            | Self::AllUnique { column }
            | Self::NotUnique { column }
            | Self::AcceptedValues { column, .. }
            | Self::MeanGreaterThan { column, .. }
            | Self::MeanSmallerThan { column, .. } => Some(column),
            Self::RowCountBetween { .. } => None,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNulls { column } => write!(f, "{column} has no nulls"),
            Self::AllNull { column } => write!(f, "{column} is all null"),
            Self::SomeNull { column } => write!(f, "{column} has some nulls"),
            Self::AllUnique { column } => write!(f, "{column} is unique"),
            Self::NotUnique { column } => write!(f, "{column} has duplicates"),
            Self::AcceptedValues { column, values } => write!(f, "{column} in {values:?}"),
            Self::MeanGreaterThan { column, value } => write!(f, "mean({column}) > {value}"),
            Self::MeanSmallerThan { column, value } => write!(f, "mean({column}) < {value}"),
            Self::RowCountBetween { min, max } => write!(f, "row count in {min}..={max}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_from_toml() {
        let check: Check = toml::from_str(
            r#"
            kind = "accepted_values"
            column = "zone"
            values = ["Queens", "Bronx"]
            "#,
        )
        .unwrap();
        assert_eq!(check.column(), Some("zone"));

        let table = Table::from_columns(vec![("zone", vec![Value::Str("Bronx".into())])]).unwrap();
        assert!(check.evaluate(&table).unwrap());
    }

    #[test]
    fn test_row_count_check() {
        let check: Check = serde_json::from_value(serde_json::json!({ "kind": "row_count_between", "min": 1, "max": 2 })).unwrap();
        let table = Table::from_columns(vec![("n", vec![Value::Int(1)])]).unwrap();
        assert!(check.evaluate(&table).unwrap());
        assert_eq!(check.to_string(), "row count in 1..=2");
        assert_eq!(check.column(), None);
    }

    #[test]
    fn test_non_scalar_accepted_value() {
        let check = Check::AcceptedValues {
            column: "n".to_string(),
            values: vec![serde_json::json!({ "a": 1 })],
        };
        let table = Table::from_columns(vec![("n", vec![Value::Int(1)])]).unwrap();
        assert!(check.evaluate(&table).is_err());
    }
}
