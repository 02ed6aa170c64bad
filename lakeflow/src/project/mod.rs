//! Project descriptors.
//!
//! A project is a directory holding `lakeflow_project.toml` plus any number
//! of `*.sql` stage files. The descriptor declares the project identity,
//! typed run parameters, operation stages and expectations; see
//! [`ProjectDescriptor`].

mod descriptor;
mod loader;
mod parameters;

pub use descriptor::{ExpectationDef, ProjectDescriptor, ProjectInfo, StageDef};
pub use loader::{load, save};
pub use parameters::{ParamType, ParameterDef};

use crate::errors::PipelineValidationError;
use crate::sql::SqlError;
use std::path::PathBuf;
use thiserror::Error;

/// Name of the descriptor file inside a project directory.
pub const PROJECT_FILE: &str = "lakeflow_project.toml";

/// Errors raised while reading, validating or writing a project.
#[derive(Debug, Clone, Error)]
pub enum ProjectError {
    /// A project file could not be read or written.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        message: String,
    },

    /// The descriptor is not valid TOML or does not match the schema.
    #[error("Malformed project descriptor: {0}")]
    Parse(String),

    /// The descriptor could not be serialized.
    #[error("Could not serialize project descriptor: {0}")]
    Serialize(String),

    /// The project id is not a UUID.
    #[error("Project id '{0}' is not a UUID")]
    InvalidId(String),

    /// The project name is empty.
    #[error("Project name must not be empty")]
    EmptyName,

    /// A parameter name, value or default is invalid.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two stages, expectations or SQL files share a name.
    #[error("Stage '{0}' is defined more than once")]
    DuplicateStage(String),

    /// An operation stage declares no inputs.
    #[error("Stage '{0}' declares no inputs")]
    MissingSource(String),

    /// A SQL stage file is invalid.
    #[error("Invalid SQL stage '{file}': {error}")]
    Sql {
        /// The file stem.
        file: String,
        /// The parse error.
        error: SqlError,
    },

    /// The stages do not form a valid pipeline.
    #[error("{0}")]
    Pipeline(#[from] PipelineValidationError),
}

impl ProjectError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
