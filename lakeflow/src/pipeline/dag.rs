//! The validated stage graph and its execution engine.
//!
//! Stages start as soon as every producer they read from has finished, so
//! independent branches of the graph run concurrently on the calling task.

use super::StageSpec;
use crate::context::{Parameters, RunIdentity, StageContext, StageInputs};
use crate::core::{ExpectationPolicy, Materialization, StageKind, StageStatus};
use crate::errors::{PipelineValidationError, StageError};
use crate::events::EventSink;
use crate::table::Table;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one stage in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub stage: String,
    /// Output artifact name.
    pub output: String,
    /// Stage kind.
    pub kind: StageKind,
    /// Output materialization.
    pub materialize: Materialization,
    /// Final status.
    pub status: StageStatus,
    /// Rows in the output, if the stage succeeded.
    pub rows: Option<usize>,
    /// Content hash of the output, if the stage succeeded.
    pub content_hash: Option<String>,
    /// Wall time spent in the stage.
    pub duration_ms: f64,
    /// Error message, if the stage failed.
    pub error: Option<String>,
}

/// Outcome of one expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationResult {
    /// Expectation stage name.
    pub name: String,
    /// The artifact that was checked.
    pub input: String,
    /// Whether the check held.
    pub passed: bool,
    /// The expectation's policy.
    pub policy: ExpectationPolicy,
}

/// Result of executing a stage graph.
#[derive(Debug, Clone)]
pub struct GraphExecutionResult {
    /// Outputs of successful stages, by artifact name.
    pub outputs: HashMap<String, Arc<Table>>,
    /// Per-stage results, in execution order.
    pub stages: Vec<StageResult>,
    /// Expectation outcomes, in completion order.
    pub expectations: Vec<ExpectationResult>,
    /// The first stage that failed.
    pub failed_stage: Option<String>,
    /// The first failure.
    pub error: Option<StageError>,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
}

impl GraphExecutionResult {
    /// Returns true if every stage succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// A validated directed acyclic graph of stages.
#[derive(Debug, Clone)]
pub struct StageGraph {
    name: String,
    /// Registration order.
    stages: Vec<StageSpec>,
    /// For each stage, the stages producing its internal inputs.
    dependencies: Vec<Vec<usize>>,
    /// For each stage, the inputs no stage produces.
    external: Vec<Vec<String>>,
    /// For each stage, the stages reading its output.
    dependents: Vec<Vec<usize>>,
    /// Topological order.
    order: Vec<usize>,
    /// Position of each stage in `order`.
    rank: Vec<usize>,
}

impl StageGraph {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageSpec>,
        dependencies: Vec<Vec<usize>>,
        external: Vec<Vec<String>>,
        order: Vec<usize>,
    ) -> Self {
        let mut dependents = vec![Vec::new(); stages.len()];
        for (consumer, deps) in dependencies.iter().enumerate() {
            for &producer in deps {
                dependents[producer].push(consumer);
            }
        }
        let mut rank = vec![0; stages.len()];
        for (position, &idx) in order.iter().enumerate() {
            rank[idx] = position;
        }
        Self {
            name,
            stages,
            dependencies,
            external,
            dependents,
            order,
            rank,
        }
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

    /// Stage names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.stages[i].name.as_str()).collect()
    }

    /// Stage specifications in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.order.iter().map(|&i| &self.stages[i])
    }

    /// Looks up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Names of the stages `name` reads from.
    #[must_use]
    pub fn upstream(&self, name: &str) -> Vec<&str> {
        self.stages
            .iter()
            .position(|s| s.name == name)
            .map(|idx| {
                self.dependencies[idx]
                    .iter()
                    .map(|&d| self.stages[d].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inputs that no stage produces and that must come from the run context.
    #[must_use]
    pub fn external_inputs(&self) -> BTreeSet<&str> {
        self.external.iter().flatten().map(String::as_str).collect()
    }

    /// Checks every external input against the run context.
    ///
    /// # Errors
    ///
    /// Returns a `CONTRACT-004-MISSING_INPUT` error naming the first stage
    /// (in execution order) whose input cannot be found.
    pub fn resolve(&self, exists: &dyn Fn(&str) -> bool) -> Result<(), PipelineValidationError> {
        for &idx in &self.order {
            for input in &self.external[idx] {
                if !exists(input) {
                    return Err(PipelineValidationError::missing_input(&self.stages[idx].name, input));
                }
            }
        }
        Ok(())
    }

    /// Executes the graph.
    ///
    /// `external` must hold every table named by
    /// [`StageGraph::external_inputs`]. Once a stage fails no new stage is
    /// started; stages already running finish, and stages never started are
    /// reported as skipped.
    pub async fn execute(
        &self,
        external: HashMap<String, Arc<Table>>,
        parameters: Arc<Parameters>,
        identity: Arc<RunIdentity>,
        sink: &dyn EventSink,
    ) -> GraphExecutionResult {
        let start = Instant::now();
        let mut available = external;
        let mut outputs = HashMap::new();
        let mut status = vec![StageStatus::Pending; self.stages.len()];
        let mut results: Vec<Option<StageResult>> = vec![None; self.stages.len()];
        let mut expectations = Vec::new();
        let mut failure: Option<(usize, StageError)> = None;

        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: Vec<usize> = self.order.iter().copied().filter(|&i| remaining[i] == 0).collect();
        let mut running = FuturesUnordered::new();

        loop {
            if failure.is_none() {
                ready.sort_by_key(|&i| self.rank[i]);
                for idx in ready.drain(..) {
                    let spec = &self.stages[idx];
                    status[idx] = StageStatus::Running;
                    let ctx = self.stage_context(idx, &available, &parameters, &identity);
                    debug!(stage = %spec.name, "Starting stage");
                    sink.emit("stage.started", Some(serde_json::json!({ "stage": spec.name })));
                    running.push(run_stage(idx, spec, ctx));
                }
            }

            let Some((idx, outcome, duration_ms)) = running.next().await else {
                break;
            };
            let spec = &self.stages[idx];

            let outcome = outcome.and_then(|table| {
                let table = Arc::new(table);
                if spec.kind == StageKind::Expectation {
                    let passed = expectation_passed(&table)
                        .ok_or_else(|| StageError::new(&spec.name, "expectation output must be one row with a boolean 'passed' column"))?;
                    expectations.push(ExpectationResult {
                        name: spec.name.clone(),
                        input: spec.inputs.first().cloned().unwrap_or_default(),
                        passed,
                        policy: spec.policy,
                    });
                    if !passed {
                        sink.emit(
                            "expectation.failed",
                            Some(serde_json::json!({ "expectation": spec.name, "policy": spec.policy })),
                        );
                        match spec.policy {
                            ExpectationPolicy::Abort => {
                                return Err(StageError::new(&spec.name, "expectation failed"));
                            }
                            ExpectationPolicy::Warn => {
                                warn!(expectation = %spec.name, "Expectation failed; continuing");
                            }
                        }
                    }
                }
                Ok(table)
            });

            match outcome {
                Ok(table) => {
                    info!(stage = %spec.name, rows = table.num_rows(), duration_ms, "Stage completed");
                    sink.emit(
                        "stage.completed",
                        Some(serde_json::json!({
                            "stage": spec.name,
                            "rows": table.num_rows(),
                            "duration_ms": duration_ms,
                        })),
                    );
                    status[idx] = StageStatus::Ok;
                    results[idx] = Some(self.result(idx, StageStatus::Ok, Some(&table), duration_ms, None));
                    available.insert(spec.output.clone(), Arc::clone(&table));
                    outputs.insert(spec.output.clone(), table);

                    for &child in &self.dependents[idx] {
                        remaining[child] -= 1;
                        if remaining[child] == 0 {
                            ready.push(child);
                        }
                    }
                }
                Err(err) => {
                    warn!(stage = %spec.name, error = %err, "Stage failed");
                    sink.emit(
                        "stage.failed",
                        Some(serde_json::json!({ "stage": spec.name, "error": err.message })),
                    );
                    status[idx] = StageStatus::Fail;
                    results[idx] = Some(self.result(idx, StageStatus::Fail, None, duration_ms, Some(err.message.clone())));
                    if failure.is_none() {
                        failure = Some((idx, err));
                    }
                }
            }
        }

        let stages = self
            .order
            .iter()
            .map(|&idx| {
                results[idx]
                    .take()
                    .unwrap_or_else(|| self.result(idx, StageStatus::Skipped, None, 0.0, None))
            })
            .collect();
        let (failed_stage, error) = match failure {
            Some((idx, err)) => (Some(self.stages[idx].name.clone()), Some(err)),
            None => (None, None),
        };

        GraphExecutionResult {
            outputs,
            stages,
            expectations,
            failed_stage,
            error,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn stage_context(
        &self,
        idx: usize,
        available: &HashMap<String, Arc<Table>>,
        parameters: &Arc<Parameters>,
        identity: &Arc<RunIdentity>,
    ) -> StageContext {
        let spec = &self.stages[idx];
        let tables = spec
            .inputs
            .iter()
            .filter_map(|name| available.get(name).map(|t| (name.clone(), Arc::clone(t))))
            .collect();
        StageContext::new(
            &spec.name,
            StageInputs::new(tables, spec.inputs.iter().cloned(), &spec.name),
            Arc::clone(parameters),
            Arc::clone(identity),
        )
    }

    fn result(
        &self,
        idx: usize,
        status: StageStatus,
        table: Option<&Table>,
        duration_ms: f64,
        error: Option<String>,
    ) -> StageResult {
        let spec = &self.stages[idx];
        StageResult {
            stage: spec.name.clone(),
            output: spec.output.clone(),
            kind: spec.kind,
            materialize: spec.materialize,
            status,
            rows: table.map(Table::num_rows),
            content_hash: table.map(Table::content_hash),
            duration_ms,
            error,
        }
    }
}

async fn run_stage(
    idx: usize,
    spec: &StageSpec,
    ctx: StageContext,
) -> (usize, Result<Table, StageError>, f64) {
    let start = Instant::now();
    let outcome = spec
        .runner
        .execute(&ctx)
        .await
        .map_err(|err| StageError::new(&spec.name, err.message));
    (idx, outcome, start.elapsed().as_secs_f64() * 1000.0)
}

fn expectation_passed(table: &Table) -> Option<bool> {
    if table.num_rows() != 1 {
        return None;
    }
    table.value(0, "passed").and_then(crate::table::Value::as_bool)
}
