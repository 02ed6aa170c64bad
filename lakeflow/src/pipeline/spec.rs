//! Stage declarations.

use crate::core::{ExpectationPolicy, Materialization, StageKind};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::Stage;
use crate::utils::is_valid_identifier;
use std::sync::Arc;

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// Names of the artifacts the stage reads, in declaration order.
    pub inputs: Vec<String>,
    /// Name of the artifact the stage produces.
    pub output: String,
    /// Where the output goes.
    pub materialize: Materialization,
    /// The kind of stage.
    pub kind: StageKind,
    /// What a failed check does; only meaningful for expectations.
    pub policy: ExpectationPolicy,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

impl StageSpec {
    /// Creates a model stage whose output is named after the stage.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        let name = name.into();
        Self {
            output: name.clone(),
            name,
            inputs: Vec::new(),
            materialize: Materialization::Transient,
            kind: StageKind::Model,
            policy: ExpectationPolicy::Abort,
            runner,
        }
    }

    /// Sets the inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Sets the output name.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Sets the materialization.
    #[must_use]
    pub fn with_materialization(mut self, materialize: Materialization) -> Self {
        self.materialize = materialize;
        self
    }

    /// Marks the stage as an expectation with the given policy.
    ///
    /// Expectation outputs are never persisted.
    #[must_use]
    pub fn as_expectation(mut self, policy: ExpectationPolicy) -> Self {
        self.kind = StageKind::Expectation;
        self.policy = policy;
        self.materialize = Materialization::Transient;
        self
    }

    /// Validates the declaration on its own, without looking at other stages.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names, a repeated input, or an input
    /// naming the stage's own output.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        for name in std::iter::once(&self.name)
            .chain(std::iter::once(&self.output))
            .chain(&self.inputs)
        {
            if !is_valid_identifier(name) {
                return Err(invalid_name(&self.name, name));
            }
        }

        for (i, input) in self.inputs.iter().enumerate() {
            if self.inputs[..i].contains(input) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' declares input '{input}' more than once",
                    self.name
                ))
                .with_stages(vec![self.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-DUPLICATE_INPUT",
                        format!("Input '{input}' is declared twice"),
                    )
                    .with_fix_hint("List each input once."),
                ));
            }
            if *input == self.output {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' cannot read its own output",
                    self.name
                ))
                .with_stages(vec![self.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-SELF_DEP",
                        format!("Stage '{}' depends on itself", self.name),
                    )
                    .with_fix_hint("Remove the stage's own output from its inputs."),
                ));
            }
        }

        if self.kind == StageKind::Expectation && self.inputs.len() != 1 {
            return Err(PipelineValidationError::new(format!(
                "Expectation '{}' must read exactly one input, found {}",
                self.name,
                self.inputs.len()
            ))
            .with_stages(vec![self.name.clone()]));
        }
        if self.kind == StageKind::Expectation && self.materialize.is_persisted() {
            return Err(PipelineValidationError::new(format!(
                "Expectation '{}' cannot be materialized",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}

fn invalid_name(stage: &str, name: &str) -> PipelineValidationError {
    PipelineValidationError::new(format!("Stage '{stage}' uses invalid name '{name}'"))
        .with_stages(vec![stage.to_string()])
        .with_error_info(
            ContractErrorInfo::new("CONTRACT-004-INVALID_NAME", format!("'{name}' is not a valid name"))
                .with_context_entry("name", name)
                .with_fix_hint("Use letters, digits and underscores, starting with a letter or underscore."),
        )
}
