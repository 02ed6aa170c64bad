//! Error types for lakeflow.
//!
//! Errors fall into three families:
//! - configuration errors, raised while assembling a pipeline and always
//!   before any stage runs ([`PipelineValidationError`], [`CycleDetectedError`],
//!   [`ProjectError`](crate::project::ProjectError)),
//! - stage execution errors ([`StageError`]), which always name the stage,
//! - collaborator errors from the catalog, the SQL layer or the filesystem,
//!   which are surfaced verbatim.

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::project::ProjectError;
use crate::sql::SqlError;
use crate::table::TableError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for lakeflow operations.
#[derive(Debug, Error)]
pub enum LakeflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage failed while running.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// The catalog rejected an operation.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// A table could not be built or transformed.
    #[error("{0}")]
    Table(#[from] TableError),

    /// A SQL statement could not be parsed or evaluated.
    #[error("{0}")]
    Sql(#[from] SqlError),

    /// A project descriptor is malformed.
    #[error("{0}")]
    Project(#[from] ProjectError),

    /// Client state under the home directory is unreadable.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A run was asked to do something its state does not allow.
    #[error("Run {job_id} cannot be promoted: {reason}")]
    NotPromotable {
        /// The run's job id.
        job_id: String,
        /// Why promotion was refused.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LakeflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        serde_json::Value::Object(map)
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Error for an input name that nothing in scope produces.
    #[must_use]
    pub fn missing_input(stage: &str, input: &str) -> Self {
        Self::new(format!(
            "Stage '{stage}' reads '{input}', which no stage produces and the run context does not contain"
        ))
        .with_stages(vec![stage.to_string()])
        .with_error_info(
            ContractErrorInfo::new(
                "CONTRACT-004-MISSING_INPUT",
                format!("Input '{input}' has no producer"),
            )
            .with_context_entry("input", input)
            .with_fix_hint("Check the input name for typos, or import the table into the branch first."),
        )
    }

    /// Error for two stages declaring the same output name.
    #[must_use]
    pub fn duplicate_output(output: &str, first: &str, second: &str) -> Self {
        Self::new(format!(
            "Artifact '{output}' is produced by both '{first}' and '{second}'"
        ))
        .with_stages(vec![first.to_string(), second.to_string()])
        .with_error_info(
            ContractErrorInfo::new(
                "CONTRACT-004-DUPLICATE_OUTPUT",
                format!("Artifact '{output}' has more than one producer"),
            )
            .with_context_entry("output", output)
            .with_fix_hint("Rename one of the outputs; an artifact name resolves to a single stage."),
        )
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONTRACT-004-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the inputs in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Error raised when a stage reads an input it did not declare.
#[derive(Debug, Clone, Error)]
#[error("Undeclared input: stage '{stage}' attempted to read '{input}' which was not declared as an input")]
pub struct UndeclaredInputError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared artifact name.
    pub input: String,
}

impl UndeclaredInputError {
    /// Creates a new undeclared input error.
    #[must_use]
    pub fn new(stage: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            input: input.into(),
        }
    }
}

/// Error raised by a stage while it runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Stage '{stage}' failed: {message}")]
pub struct StageError {
    /// The failing stage.
    pub stage: String,
    /// What went wrong.
    pub message: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<UndeclaredInputError> for StageError {
    fn from(err: UndeclaredInputError) -> Self {
        Self {
            stage: err.stage.clone(),
            message: err.to_string(),
        }
    }
}
