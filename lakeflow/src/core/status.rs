//! Stage status, kind, materialization and expectation policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a stage is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A transformation producing a table.
    #[default]
    Model,
    /// A boolean data-quality check over one input.
    Expectation,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Expectation => write!(f, "expectation"),
        }
    }
}

/// Whether, and how, a stage output is written to the run branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// Kept in memory for downstream stages only.
    #[default]
    Transient,
    /// Replaces the table of the same name.
    Replace,
    /// Appends to the table of the same name, creating it if absent.
    Append,
}

impl Materialization {
    /// Returns true if the output is written to the catalog.
    #[must_use]
    pub fn is_persisted(self) -> bool {
        !matches!(self, Self::Transient)
    }

    /// Parses `transient`, `replace` or `append`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transient" | "none" => Some(Self::Transient),
            "replace" => Some(Self::Replace),
            "append" => Some(Self::Append),
            _ => None,
        }
    }
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Replace => write!(f, "replace"),
            Self::Append => write!(f, "append"),
        }
    }
}

/// What a failing expectation does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationPolicy {
    /// The run fails.
    #[default]
    Abort,
    /// The failure is logged and recorded; the run continues.
    Warn,
}

impl fmt::Display for ExpectationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    #[default]
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Fail,
    /// Stage never ran because the run was aborted.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Fail | Self::Skipped)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Ok.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::Fail.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Ok).unwrap();
        assert_eq!(json, r#""ok""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Ok);
    }

    #[test]
    fn test_materialization_parse() {
        assert_eq!(Materialization::parse("REPLACE"), Some(Materialization::Replace));
        assert_eq!(Materialization::parse(" append "), Some(Materialization::Append));
        assert_eq!(Materialization::parse("merge"), None);
        assert!(!Materialization::default().is_persisted());
        assert_eq!(StageKind::Expectation.to_string(), "expectation");
        assert_eq!(ExpectationPolicy::default(), ExpectationPolicy::Abort);
    }
}
