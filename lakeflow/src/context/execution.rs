//! The context handed to a running stage.

use super::{ParamValue, Parameters, RunIdentity, StageInputs};
use crate::errors::StageError;
use crate::table::Table;
use std::sync::Arc;

/// Everything a stage can see while it runs: its declared inputs, the run
/// parameters and the run identity.
#[derive(Debug, Clone)]
pub struct StageContext {
    stage_name: String,
    inputs: StageInputs,
    parameters: Arc<Parameters>,
    identity: Arc<RunIdentity>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        stage_name: impl Into<String>,
        inputs: StageInputs,
        parameters: Arc<Parameters>,
        identity: Arc<RunIdentity>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            inputs,
            parameters,
            identity,
        }
    }

    /// Creates a context outside of any run, for exercising a stage directly.
    #[must_use]
    pub fn detached(stage_name: impl Into<String>, inputs: StageInputs) -> Self {
        let stage_name = stage_name.into();
        let identity = RunIdentity::new(stage_name.clone(), "local");
        Self::new(stage_name, inputs, Arc::new(Parameters::new()), Arc::new(identity))
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the stage inputs.
    #[must_use]
    pub fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// Reads a declared input that must be present.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] if the input is undeclared or missing.
    pub fn input(&self, name: &str) -> Result<Arc<Table>, StageError> {
        self.inputs
            .get(name)?
            .ok_or_else(|| StageError::new(&self.stage_name, format!("input '{name}' is not available")))
    }

    /// Looks up a run parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    /// Returns all run parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Builds a [`StageError`] attributed to this stage.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> StageError {
        StageError::new(&self.stage_name, message)
    }
}
