//! The `lakeflow_project.toml` schema.

use super::{ParamType, ParameterDef, ProjectError};
use crate::context::{ParamValue, Parameters};
use crate::core::{ExpectationPolicy, Materialization};
use crate::expectations::{Check, ExpectationStage};
use crate::pipeline::PipelineBuilder;
use crate::sql::SqlStageFile;
use crate::stages::OpsStage;
use crate::table::TableOp;
use crate::utils::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// The `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Stable project id.
    pub id: String,
    /// Human-readable name, also used as the pipeline name.
    pub name: String,
}

/// A stage defined by a list of table operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    /// Stage name.
    pub name: String,
    /// Inputs; the first one is the table the operations start from.
    pub inputs: Vec<String>,
    /// Output name; defaults to the stage name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// How the output is materialized.
    #[serde(default)]
    pub materialize: Materialization,
    /// Operations, applied in order.
    #[serde(default)]
    pub ops: Vec<TableOp>,
}

/// An expectation over one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationDef {
    /// Stage name.
    pub name: String,
    /// The checked table.
    pub input: String,
    /// The check.
    pub check: Check,
    /// What a failure does to the run.
    #[serde(default)]
    pub policy: ExpectationPolicy,
}

/// A parsed and validated project.
///
/// SQL stages are not part of the TOML file; [`load`](super::load) adds
/// them from the `*.sql` files next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Identity.
    pub project: ProjectInfo,
    /// Declared parameters, by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterDef>,
    /// Operation stages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageDef>,
    /// Expectations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expectations: Vec<ExpectationDef>,
    #[serde(skip)]
    sql: Vec<SqlStageFile>,
}

impl ProjectDescriptor {
    /// Creates an empty project with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: ProjectInfo {
                id: Uuid::new_v4().to_string(),
                name: name.into(),
            },
            parameters: BTreeMap::new(),
            stages: Vec::new(),
            expectations: Vec::new(),
            sql: Vec::new(),
        }
    }

    /// Parses and validates descriptor text.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Parse`] for malformed TOML and any
    /// [`ProjectDescriptor::validate`] error.
    pub fn parse(text: &str) -> Result<Self, ProjectError> {
        let descriptor: Self = toml::from_str(text).map_err(|e| ProjectError::Parse(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Serializes the descriptor back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ProjectError> {
        toml::to_string_pretty(self).map_err(|e| ProjectError::Serialize(e.to_string()))
    }

    /// Checks the id, the name, every parameter default and the uniqueness
    /// of stage names.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if Uuid::parse_str(&self.project.id).is_err() {
            return Err(ProjectError::InvalidId(self.project.id.clone()));
        }
        if self.project.name.trim().is_empty() {
            return Err(ProjectError::EmptyName);
        }
        for (name, def) in &self.parameters {
            check_parameter_name(name)?;
            def.default_value(name)?;
        }

        let mut seen = HashSet::new();
        for name in self.stage_names() {
            if !seen.insert(name) {
                return Err(ProjectError::DuplicateStage(name.to_string()));
            }
        }
        if let Some(stage) = self.stages.iter().find(|s| s.inputs.is_empty()) {
            return Err(ProjectError::MissingSource(stage.name.clone()));
        }
        Ok(())
    }

    fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.sql.iter().map(|s| s.name.as_str()))
            .chain(self.expectations.iter().map(|e| e.name.as_str()))
    }

    /// Adds a SQL stage.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::DuplicateStage`] if the name is taken.
    pub fn add_sql(&mut self, file: SqlStageFile) -> Result<(), ProjectError> {
        if self.stage_names().any(|name| name == file.name) {
            return Err(ProjectError::DuplicateStage(file.name));
        }
        self.sql.push(file);
        Ok(())
    }

    /// SQL stages, in the order they were added.
    #[must_use]
    pub fn sql_stages(&self) -> &[SqlStageFile] {
        &self.sql
    }

    /// Declared defaults as run parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] for a default that does
    /// not match its type.
    pub fn default_parameters(&self) -> Result<Parameters, ProjectError> {
        let mut parameters = Parameters::new();
        for (name, def) in &self.parameters {
            if let Some(value) = def.default_value(name)? {
                parameters.insert(name.clone(), value);
            }
        }
        Ok(parameters)
    }

    /// Parses a value for a run, using the declared type when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] if `raw` does not fit the
    /// declared type.
    pub fn parse_parameter(&self, name: &str, raw: &str) -> Result<ParamValue, ProjectError> {
        let param_type = self
            .parameters
            .get(name)
            .map_or_else(|| ParamType::infer(raw), |def| def.param_type);
        param_type.parse(name, raw)
    }

    /// Declares or updates a parameter's default.
    ///
    /// A declared parameter keeps its type unless `secret` is set; an
    /// undeclared one gets the type inferred from `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::InvalidParameter`] for an invalid name or a
    /// value that does not fit.
    pub fn set_parameter(&mut self, name: &str, raw: &str, secret: bool) -> Result<ParamValue, ProjectError> {
        check_parameter_name(name)?;
        let value = if secret {
            ParamType::Secret.parse(name, raw)?
        } else {
            self.parse_parameter(name, raw)?
        };

        let mut def = ParameterDef::new(&value);
        if let Some(existing) = self.parameters.get(name) {
            def.description.clone_from(&existing.description);
        }
        tracing::debug!(parameter = %name, param_type = %def.param_type, "Set parameter");
        self.parameters.insert(name.to_string(), def);
        Ok(value)
    }

    /// Registers every stage with a new pipeline builder.
    ///
    /// Operation stages come first, then SQL stages, then expectations.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Pipeline`] if a registration is rejected.
    pub fn into_pipeline(&self) -> Result<PipelineBuilder, ProjectError> {
        let mut builder = PipelineBuilder::new(self.project.name.clone());

        for def in &self.stages {
            let Some(source) = def.inputs.first() else {
                return Err(ProjectError::MissingSource(def.name.clone()));
            };
            let stage = OpsStage::new(def.name.clone(), source.clone(), def.ops.clone());
            let mut inputs = def.inputs.clone();
            for input in stage.inputs() {
                if !inputs.contains(&input) {
                    inputs.push(input);
                }
            }

            let mut registration = builder
                .register(def.name.clone())
                .inputs(inputs)
                .materialize(def.materialize)
                .runner(Arc::new(stage));
            if let Some(output) = &def.output {
                registration = registration.output(output.clone());
            }
            registration.done()?;
        }

        for file in &self.sql {
            builder
                .register(file.name.clone())
                .inputs(file.inputs().iter().cloned())
                .materialize(file.materialize)
                .runner(Arc::new(file.stage.clone()))
                .done()?;
        }

        for def in &self.expectations {
            let stage = ExpectationStage::new(def.name.clone(), def.input.clone(), def.check.clone());
            builder
                .register(def.name.clone())
                .input(def.input.clone())
                .expectation(def.policy)
                .runner(Arc::new(stage))
                .done()?;
        }

        Ok(builder)
    }
}

fn check_parameter_name(name: &str) -> Result<(), ProjectError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ProjectError::InvalidParameter {
            name: name.to_string(),
            reason: "names must be identifiers".to_string(),
        })
    }
}
