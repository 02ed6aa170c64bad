//! Parameter declarations.

use super::ProjectError;
use crate::context::ParamValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// 64-bit integer.
    Int,
    /// 64-bit float; integer literals are accepted.
    Float,
    /// Boolean.
    Bool,
    /// String.
    Str,
    /// String that is masked whenever it is printed.
    Secret,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Str => write!(f, "str"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

impl ParamType {
    /// The type a command-line value most likely has.
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        if raw.parse::<i64>().is_ok() {
            Self::Int
        } else if raw.parse::<f64>().is_ok_and(f64::is_finite) {
            Self::Float
        } else if raw.parse::<bool>().is_ok() {
            Self::Bool
        } else {
            Self::Str
        }
    }

    /// Parses a command-line value.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] if `raw` does not fit.
    pub fn parse(self, name: &str, raw: &str) -> Result<ParamValue, ProjectError> {
        let invalid = || ProjectError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected {self}"),
        };
        match self {
            Self::Int => raw.trim().parse().map(ParamValue::Int).map_err(|_| invalid()),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(ParamValue::Float)
                .ok_or_else(invalid),
            Self::Bool => raw.trim().parse().map(ParamValue::Bool).map_err(|_| invalid()),
            Self::Str => Ok(ParamValue::Str(raw.to_string())),
            Self::Secret => Ok(ParamValue::Secret(raw.to_string())),
        }
    }

    /// Converts a descriptor value.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] if `value` does not fit.
    pub fn convert(self, name: &str, value: &serde_json::Value) -> Result<ParamValue, ProjectError> {
        let converted = match self {
            Self::Int => value.as_i64().map(ParamValue::Int),
            Self::Float => value.as_f64().map(ParamValue::Float),
            Self::Bool => value.as_bool().map(ParamValue::Bool),
            Self::Str => value.as_str().map(|s| ParamValue::Str(s.to_string())),
            Self::Secret => value.as_str().map(|s| ParamValue::Secret(s.to_string())),
        };
        converted.ok_or_else(|| ProjectError::InvalidParameter {
            name: name.to_string(),
            reason: format!("default does not match type {self}"),
        })
    }
}

/// A parameter declared in the project descriptor.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Value used when a run does not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// What the parameter is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDef {
    /// Declares a parameter with a default.
    #[must_use]
    pub fn new(value: &ParamValue) -> Self {
        let (param_type, default) = match value {
            ParamValue::Int(v) => (ParamType::Int, serde_json::json!(v)),
            ParamValue::Float(v) => (ParamType::Float, serde_json::json!(v)),
            ParamValue::Bool(v) => (ParamType::Bool, serde_json::json!(v)),
            ParamValue::Str(v) => (ParamType::Str, serde_json::json!(v)),
            ParamValue::Secret(v) => (ParamType::Secret, serde_json::json!(v)),
        };
        Self {
            param_type,
            default: Some(default),
            description: None,
        }
    }

    /// The typed default, if one is declared.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] if the default does not
    /// match the declared type.
    pub fn default_value(&self, name: &str) -> Result<Option<ParamValue>, ProjectError> {
        self.default
            .as_ref()
            .map(|value| self.param_type.convert(name, value))
            .transpose()
    }
}

impl fmt::Debug for ParameterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default: Option<&dyn fmt::Debug> = match (&self.default, self.param_type) {
            (None, _) => None,
            (Some(_), ParamType::Secret) => Some(&"********"),
            (Some(value), _) => Some(value),
        };
        f.debug_struct("ParameterDef")
            .field("param_type", &self.param_type)
            .field("default", &default)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_and_parse() {
        assert_eq!(ParamType::infer("3"), ParamType::Int);
        assert_eq!(ParamType::infer("0.5"), ParamType::Float);
        assert_eq!(ParamType::infer("true"), ParamType::Bool);
        assert_eq!(ParamType::infer("eu-west"), ParamType::Str);

        assert_eq!(ParamType::Float.parse("p", "2").unwrap(), ParamValue::Float(2.0));
        assert!(ParamType::Int.parse("p", "two").is_err());

        assert_eq!(ParamType::infer("inf"), ParamType::Str);
        assert!(ParamType::Float.parse("p", "NaN").is_err());
    }

    #[test]
    fn test_default_must_match_type() {
        let def: ParameterDef = toml::from_str("type = \"int\"\ndefault = \"one\"").unwrap();
        assert!(matches!(def.default_value("run_id"), Err(ProjectError::InvalidParameter { .. })));

        let def: ParameterDef = toml::from_str("type = \"float\"\ndefault = 1").unwrap();
        assert_eq!(def.default_value("ratio").unwrap(), Some(ParamValue::Float(1.0)));
    }

    #[test]
    fn test_secret_default_is_masked() {
        let def = ParameterDef::new(&ParamValue::Secret("hunter2".to_string()));
        let shown = format!("{def:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("********"));
    }
}
