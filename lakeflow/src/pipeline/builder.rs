//! Pipeline builder with eager validation.

use super::{StageGraph, StageSpec};
use crate::core::{ExpectationPolicy, Materialization, StageKind};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use crate::stages::Stage;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Each registration is checked as soon as it is committed; graph-wide
/// checks (input resolution, cycles) run in [`PipelineBuilder::build`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stage specifications, in registration order.
    stages: Vec<StageSpec>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Starts registering a stage. Nothing is recorded until
    /// [`StageRegistration::done`] succeeds.
    pub fn register(&mut self, name: impl Into<String>) -> StageRegistration<'_> {
        StageRegistration {
            builder: self,
            name: name.into(),
            inputs: Vec::new(),
            output: None,
            materialize: Materialization::Transient,
            expectation: None,
            runner: None,
        }
    }

    /// Adds a complete stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the specification is invalid on its own, or if
    /// its name or output is already taken.
    pub fn add(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.iter().any(|s| s.name == spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is registered twice",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE_STAGE",
                    format!("Stage name '{}' is taken", spec.name),
                )
                .with_fix_hint("Give every stage a unique name."),
            ));
        }
        if let Some(first) = self.stages.iter().find(|s| s.output == spec.output) {
            return Err(PipelineValidationError::duplicate_output(
                &spec.output,
                &first.name,
                &spec.name,
            ));
        }

        tracing::debug!(pipeline = %self.name, stage = %spec.name, output = %spec.output, "Registered stage");
        self.stages.push(spec);
        Ok(())
    }

    /// Chaining form of [`PipelineBuilder::add`].
    ///
    /// # Errors
    ///
    /// See [`PipelineBuilder::add`].
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add(spec)?;
        Ok(self)
    }

    /// Builds the stage graph.
    ///
    /// Every input resolves either to the stage producing it or, when no
    /// stage does, to an external input that must exist in the run context
    /// (see [`StageGraph::resolve`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages or the graph has a
    /// cycle.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages").with_error_info(
                ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Register at least one stage before building."),
            ));
        }

        let producers: HashMap<&str, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.output.as_str(), idx))
            .collect();

        let mut dependencies = Vec::with_capacity(self.stages.len());
        let mut external = Vec::with_capacity(self.stages.len());
        for spec in &self.stages {
            let mut deps = Vec::new();
            let mut ext = Vec::new();
            for input in &spec.inputs {
                match producers.get(input.as_str()) {
                    Some(&producer) => deps.push(producer),
                    None => ext.push(input.clone()),
                }
            }
            dependencies.push(deps);
            external.push(ext);
        }

        if let Some(cycle) = find_cycle(&self.stages, &dependencies) {
            return Err(CycleDetectedError::new(cycle).into());
        }
        let order = topological_order(&dependencies);

        Ok(StageGraph::new(self.name, self.stages, dependencies, external, order))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// An in-progress stage registration.
#[must_use = "a registration does nothing until `done` is called"]
pub struct StageRegistration<'a> {
    builder: &'a mut PipelineBuilder,
    name: String,
    inputs: Vec<String>,
    output: Option<String>,
    materialize: Materialization,
    expectation: Option<ExpectationPolicy>,
    runner: Option<Arc<dyn Stage>>,
}

impl StageRegistration<'_> {
    /// Declares one input.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declares several inputs.
    pub fn inputs(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Names the output; defaults to the stage name.
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.output = Some(name.into());
        self
    }

    /// Sets how the output is materialized.
    pub fn materialize(mut self, materialize: Materialization) -> Self {
        self.materialize = materialize;
        self
    }

    /// Persists the output, replacing any previous version.
    pub fn persist(self) -> Self {
        self.materialize(Materialization::Replace)
    }

    /// Marks the stage as an expectation.
    pub fn expectation(mut self, policy: ExpectationPolicy) -> Self {
        self.expectation = Some(policy);
        self
    }

    /// Sets the implementation.
    pub fn runner(mut self, runner: Arc<dyn Stage>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Validates the registration and records it.
    ///
    /// # Errors
    ///
    /// Returns an error if no runner was given or the stage fails
    /// [`PipelineBuilder::add`] validation.
    pub fn done(self) -> Result<(), PipelineValidationError> {
        let Some(runner) = self.runner else {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' has no implementation",
                self.name
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-004-MISSING_RUNNER", "Stage has no runner")
                    .with_fix_hint("Call `runner(...)` before `done()`."),
            ));
        };

        let mut spec = StageSpec::new(self.name, runner)
            .with_inputs(self.inputs)
            .with_materialization(self.materialize);
        if let Some(output) = self.output {
            spec = spec.with_output(output);
        }
        if let Some(policy) = self.expectation {
            if spec.materialize.is_persisted() {
                spec.kind = StageKind::Expectation;
            } else {
                spec = spec.as_expectation(policy);
            }
            spec.policy = policy;
        }
        self.builder.add(spec)
    }
}

/// Depth-first search over dependency edges, visiting stages in
/// registration order. Returns the first cycle found, closed on its start.
fn find_cycle(stages: &[StageSpec], dependencies: &[Vec<usize>]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        node: usize,
        dependencies: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::Active;
        path.push(node);
        for &dep in &dependencies[node] {
            match marks[dep] {
                Mark::New => {
                    if let Some(cycle) = visit(dep, dependencies, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Active => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; stages.len()];
    let mut path = Vec::new();
    for node in 0..stages.len() {
        if marks[node] == Mark::New {
            if let Some(cycle) = visit(node, dependencies, &mut marks, &mut path) {
                return Some(cycle.into_iter().map(|i| stages[i].name.clone()).collect());
            }
        }
    }
    None
}

/// Dependencies-first order; ties are broken by registration order.
fn topological_order(dependencies: &[Vec<usize>]) -> Vec<usize> {
    fn visit(node: usize, dependencies: &[Vec<usize>], visited: &mut [bool], order: &mut Vec<usize>) {
        if visited[node] {
            return;
        }
        visited[node] = true;
        for &dep in &dependencies[node] {
            visit(dep, dependencies, visited, order);
        }
        order.push(node);
    }

    let mut visited = vec![false; dependencies.len()];
    let mut order = Vec::with_capacity(dependencies.len());
    for node in 0..dependencies.len() {
        visit(node, dependencies, &mut visited, &mut order);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::ConstStage;
    use crate::table::Table;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(ConstStage::new(name, Table::from_columns(vec![]).unwrap()))
    }

    fn register(builder: &mut PipelineBuilder, name: &str, inputs: &[&str]) -> Result<(), PipelineValidationError> {
        builder
            .register(name)
            .inputs(inputs.iter().copied())
            .runner(noop(name))
            .done()
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("test");
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_register_records_stage() {
        let mut builder = PipelineBuilder::new("test");
        builder
            .register("clean")
            .input("raw_events")
            .persist()
            .runner(noop("clean"))
            .done()
            .unwrap();

        assert_eq!(builder.stage_count(), 1);
        assert_eq!(builder.stages[0].materialize, Materialization::Replace);
        assert_eq!(builder.stages[0].output, "clean");
    }

    #[test]
    fn test_register_without_runner() {
        let mut builder = PipelineBuilder::new("test");
        let err = builder.register("clean").done().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-MISSING_RUNNER"));
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_duplicate_stage_and_output() {
        let mut builder = PipelineBuilder::new("test");
        register(&mut builder, "a", &[]).unwrap();

        let err = register(&mut builder, "a", &[]).unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE_STAGE"));

        let err = builder
            .register("b")
            .output("a")
            .runner(noop("b"))
            .done()
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE_OUTPUT"));
        assert_eq!(err.stages, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_build_empty() {
        let err = PipelineBuilder::new("test").build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));
    }

    #[test]
    fn test_build_cycle() {
        let mut builder = PipelineBuilder::new("test");
        register(&mut builder, "a", &["c"]).unwrap();
        register(&mut builder, "b", &["a"]).unwrap();
        register(&mut builder, "c", &["b"]).unwrap();

        let err = builder.build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-CYCLE"));
        assert_eq!(err.stages, vec!["a", "c", "b", "a"]);
    }

    #[test]
    fn test_build_order_is_deterministic() {
        let mut builder = PipelineBuilder::new("test");
        register(&mut builder, "report", &["hourly", "zones_clean"]).unwrap();
        register(&mut builder, "hourly", &["clean"]).unwrap();
        register(&mut builder, "clean", &["raw_events"]).unwrap();
        register(&mut builder, "zones_clean", &["zones"]).unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(
            graph.execution_order(),
            vec!["clean", "hourly", "zones_clean", "report"]
        );
    }

    #[test]
    fn test_stage_reads_table_named_like_itself() {
        let mut builder = PipelineBuilder::new("test");
        builder
            .register("clean")
            .input("clean")
            .output("clean_v2")
            .runner(noop("clean"))
            .done()
            .unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.execution_order(), vec!["clean"]);
        assert!(graph.external_inputs().contains("clean"));
    }

    #[test]
    fn test_expectation_registration() {
        let mut builder = PipelineBuilder::new("test");
        builder
            .register("check")
            .input("clean")
            .expectation(ExpectationPolicy::Warn)
            .runner(noop("check"))
            .done()
            .unwrap();
        assert_eq!(builder.stages[0].kind, StageKind::Expectation);

        let err = builder
            .register("check2")
            .input("clean")
            .persist()
            .expectation(ExpectationPolicy::Abort)
            .runner(noop("check2"))
            .done();
        assert!(err.is_err());
    }
}
