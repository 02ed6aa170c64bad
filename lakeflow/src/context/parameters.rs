//! Run parameters.

use crate::table::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed parameter value available to every stage of a run.
///
/// Secrets never print their content: `Debug` and `Display` both show a
/// mask, and only [`ParamValue::reveal`] hands the plain text out.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    /// Integer parameter.
    Int(i64),
    /// Float parameter.
    Float(f64),
    /// Boolean parameter.
    Bool(bool),
    /// String parameter.
    Str(String),
    /// Secret string parameter.
    Secret(String),
}

const MASK: &str = "********";

impl ParamValue {
    /// The type name used in project descriptors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "str",
            Self::Secret(_) => "secret",
        }
    }

    /// Returns true for secrets.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    /// The value as plain text, secrets included.
    #[must_use]
    pub fn reveal(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Str(v) | Self::Secret(v) => v.clone(),
        }
    }

    /// Integer value, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a table cell; `None` for secrets, which never enter a
    /// table.
    #[must_use]
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Int(v) => Some(Value::Int(*v)),
            Self::Float(v) => Some(Value::Float(*v)),
            Self::Bool(v) => Some(Value::Bool(*v)),
            Self::Str(v) => Some(Value::Str(v.clone())),
            Self::Secret(_) => None,
        }
    }

    /// String value; secrets are not returned here.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Secret(_) => f.debug_tuple("Secret").field(&MASK).finish(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(_) => f.write_str(MASK),
            other => f.write_str(&other.reveal()),
        }
    }
}

/// Parameters of a run, by name.
pub type Parameters = BTreeMap<String, ParamValue>;
