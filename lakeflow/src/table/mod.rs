//! Tabular artifacts.
//!
//! Every stage consumes and produces [`Table`]s: an immutable schema plus
//! rows of [`Value`]s. Tables are passed around as `Arc<Table>` and are
//! content-addressed in the catalog by [`Table::content_hash`].

mod frame;
mod json;
pub mod ops;
mod schema;
mod value;

pub use frame::Table;
pub(crate) use frame::infer_type;
pub use ops::{AggregateOp, AggregateSpec, CompareOp, TableOp, TimeUnit};
pub use schema::{Column, DataType, Schema};
pub use value::{parse_timestamp, Value};

use thiserror::Error;

/// Errors raised while building or transforming tables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// Two columns share a name.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    /// A referenced column does not exist.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// A row has the wrong number of values.
    #[error("row {row} has {found} values, expected {expected}")]
    ArityMismatch {
        /// Row index.
        row: usize,
        /// Number of columns in the schema.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },

    /// A value does not fit its column type.
    #[error("column '{column}' expects {expected}, found {found}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Declared type.
        expected: DataType,
        /// Type of the offending value.
        found: String,
    },

    /// A non-nullable column holds a null.
    #[error("column '{column}' is not nullable but row {row} is null")]
    NullInNonNullable {
        /// Column name.
        column: String,
        /// Row index.
        row: usize,
    },

    /// Two tables that must share a schema do not.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A float is infinite or NaN.
    #[error("column '{column}' row {row} holds non-finite float {value}")]
    NonFiniteFloat {
        /// Column name.
        column: String,
        /// Row index.
        row: usize,
        /// The offending value, as printed.
        value: String,
    },

    /// Arithmetic left the representable range.
    #[error("overflow: {0}")]
    Overflow(String),

    /// A JSON document could not be read as a table.
    #[error("invalid JSON table: {0}")]
    Json(String),

    /// An operation cannot be applied to this table.
    #[error("{0}")]
    InvalidOperation(String),
}
