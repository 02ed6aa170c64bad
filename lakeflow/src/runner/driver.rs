//! The run driver.

use super::{RunOptions, RunState, RunStatus};
use crate::catalog::{Catalog, Commit, CommitMeta, MergeOutcome, TableChange, TableChanges};
use crate::context::RunIdentity;
use crate::core::{Materialization, StageStatus};
use crate::errors::LakeflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::{StageGraph, StageResult};
use crate::table::Table;
use crate::utils::run_branch_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commit property naming the stage whose output a commit wrote.
pub const STAGE_PROPERTY: &str = "lakeflow.stage";

/// Runs stage graphs transactionally against a catalog.
pub struct PipelineRunner {
    catalog: Arc<dyn Catalog>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRunner").finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner that reports no events.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The catalog runs write to.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Runs the graph and, unless `options.detach` is set, promotes a
    /// successful run.
    ///
    /// # Errors
    ///
    /// Returns configuration and catalog errors from
    /// [`PipelineRunner::stage_run`], and merge conflicts from promotion.
    /// A failed stage is not an error: it is reported in the returned state.
    pub async fn run(&self, graph: &StageGraph, options: &RunOptions) -> Result<RunState, LakeflowError> {
        let mut state = self.stage_run(graph, options).await?;
        if state.is_success() && !options.detach {
            self.promote(&mut state)?;
        }
        Ok(state)
    }

    /// Runs the graph on a fresh run branch without promoting it.
    ///
    /// # Errors
    ///
    /// Fails before any stage runs if the target branch does not exist or
    /// an external input is missing from it. In the latter case the run
    /// branch is removed again.
    pub async fn stage_run(&self, graph: &StageGraph, options: &RunOptions) -> Result<RunState, LakeflowError> {
        if !self.catalog.has_branch(&options.target) {
            return Err(crate::catalog::CatalogError::BranchNotFound(options.target.clone()).into());
        }
        let identity = Arc::new(RunIdentity::new(graph.name(), &options.author));
        let run_branch = run_branch_name(&options.target, &identity.job_id);
        let fork = self.catalog.create_branch(&run_branch, &options.target)?;

        info!(
            job_id = %identity.job_id,
            pipeline = graph.name(),
            target = %options.target,
            run_branch = %run_branch,
            "Starting run"
        );
        self.sink.emit(
            "run.started",
            Some(serde_json::json!({
                "job_id": identity.job_id.to_string(),
                "pipeline": graph.name(),
                "target": options.target,
                "run_branch": run_branch,
            })),
        );

        let external = match self.load_external(graph, &fork) {
            Ok(tables) => tables,
            Err(err) => {
                if let Err(cleanup) = self.catalog.delete_branch(&run_branch) {
                    warn!(run_branch = %run_branch, error = %cleanup, "Could not remove run branch");
                }
                self.sink.emit(
                    "run.failed",
                    Some(serde_json::json!({
                        "job_id": identity.job_id.to_string(),
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
        };

        let execution = graph
            .execute(
                external,
                Arc::new(options.parameters.clone()),
                Arc::clone(&identity),
                self.sink.as_ref(),
            )
            .await;

        let mut failed_stage = execution.failed_stage.clone();
        let mut error = execution.error.as_ref().map(ToString::to_string);
        let mut commits = Vec::new();
        let mut head = fork.id.clone();
        for result in &execution.stages {
            if result.status != StageStatus::Ok || !result.materialize.is_persisted() {
                continue;
            }
            let Some(table) = execution.outputs.get(&result.output) else {
                continue;
            };
            match self.materialize(&run_branch, &head, result, table, &identity) {
                Ok(commit) => {
                    debug!(stage = %result.stage, commit = commit.short_id(), "Materialized output");
                    head = commit.id.clone();
                    commits.push(commit.id);
                }
                Err(err) => {
                    warn!(stage = %result.stage, error = %err, "Could not materialize output");
                    if error.is_none() {
                        failed_stage = Some(result.stage.clone());
                        error = Some(format!("Stage '{}' failed: {err}", result.stage));
                    }
                    break;
                }
            }
        }

        let status = if error.is_none() { RunStatus::Success } else { RunStatus::Failed };
        let state = RunState {
            job_id: identity.job_id,
            pipeline: graph.name().to_string(),
            status,
            target_branch: options.target.clone(),
            run_branch,
            fork_head: fork.id,
            stages: execution.stages,
            expectations: execution.expectations,
            failed_stage,
            error,
            commits,
            promoted: false,
            duration_ms: execution.duration_ms,
        };

        match state.status {
            RunStatus::Success => {
                info!(job_id = %state.job_id, commits = state.commits.len(), duration_ms = state.duration_ms, "Run succeeded");
                self.sink.emit(
                    "run.completed",
                    Some(serde_json::json!({
                        "job_id": state.job_id.to_string(),
                        "run_branch": state.run_branch,
                        "stages": state.stages.len(),
                        "commits": state.commits.len(),
                        "duration_ms": state.duration_ms,
                    })),
                );
            }
            RunStatus::Failed => {
                warn!(
                    job_id = %state.job_id,
                    failed_stage = state.failed_stage.as_deref().unwrap_or("-"),
                    run_branch = %state.run_branch,
                    "Run failed; run branch kept for inspection"
                );
                self.sink.emit(
                    "run.failed",
                    Some(serde_json::json!({
                        "job_id": state.job_id.to_string(),
                        "run_branch": state.run_branch,
                        "failed_stage": state.failed_stage,
                        "error": state.error,
                    })),
                );
            }
        }
        Ok(state)
    }

    /// Merges a successful run into its target and deletes the run branch.
    ///
    /// # Errors
    ///
    /// Returns [`LakeflowError::NotPromotable`] for failed or already
    /// promoted runs, and [`CatalogError::Conflict`](crate::catalog::CatalogError::Conflict)
    /// when the target changed the same tables since the fork. The target
    /// is unchanged on error.
    pub fn promote(&self, state: &mut RunState) -> Result<Commit, LakeflowError> {
        let not_promotable = |reason: &str| LakeflowError::NotPromotable {
            job_id: state.job_id.to_string(),
            reason: reason.to_string(),
        };
        if state.promoted {
            return Err(not_promotable("already promoted"));
        }
        if !state.is_success() {
            return Err(not_promotable(state.error.as_deref().unwrap_or("run failed")));
        }

        let target_head = self.catalog.resolve(&state.target_branch)?;
        if target_head.id != state.fork_head {
            debug!(
                target = %state.target_branch,
                fork_head = %state.fork_head,
                head = %target_head.id,
                "Target moved since fork; merging"
            );
        }
        let outcome = self.promote_branch(&state.run_branch, &state.target_branch)?;
        state.promoted = true;
        Ok(outcome.commit().clone())
    }

    /// Merges `run_branch` into `into` and deletes `run_branch`.
    ///
    /// # Errors
    ///
    /// Returns catalog errors for unknown branches and merge conflicts.
    pub fn promote_branch(&self, run_branch: &str, into: &str) -> Result<MergeOutcome, LakeflowError> {
        let head = self.catalog.resolve(run_branch)?;
        let mut meta = CommitMeta::new(format!("Promote {run_branch} into {into}"), head.author.clone());
        if let Some(job_id) = head.job_id() {
            meta = meta.with_property(crate::catalog::JOB_ID_PROPERTY, job_id);
        }
        let outcome = self.catalog.merge_branch(run_branch, into, meta)?;
        self.catalog.delete_branch(run_branch)?;

        info!(run_branch, into, head = outcome.commit().short_id(), "Promoted run");
        self.sink.emit(
            "run.promoted",
            Some(serde_json::json!({
                "run_branch": run_branch,
                "into": into,
                "commit": outcome.commit().id,
                "fast_forward": !matches!(outcome, MergeOutcome::Merged(_)),
            })),
        );
        Ok(outcome)
    }

    fn load_external(&self, graph: &StageGraph, fork: &Commit) -> Result<HashMap<String, Arc<Table>>, LakeflowError> {
        graph.resolve(&|name| fork.tables.contains_key(name))?;
        let at = format!("@{}", fork.id);
        graph
            .external_inputs()
            .into_iter()
            .map(|name| Ok((name.to_string(), self.catalog.get_table(name, &at)?)))
            .collect()
    }

    fn materialize(
        &self,
        branch: &str,
        head: &str,
        result: &StageResult,
        table: &Arc<Table>,
        identity: &RunIdentity,
    ) -> Result<Commit, LakeflowError> {
        let appends = result.materialize == Materialization::Append;
        let table = if appends && self.catalog.has_table(&result.output, branch)? {
            let existing = self.catalog.get_table(&result.output, branch)?;
            Arc::new(existing.append(table)?)
        } else {
            Arc::clone(table)
        };
        let mut changes = TableChanges::new();
        changes.insert(result.output.clone(), TableChange::Put(table));
        let meta = CommitMeta::new(
            format!("{}: {} {}", identity.pipeline, result.materialize, result.output),
            identity.author.clone(),
        )
        .with_job_id(&identity.job_id)
        .with_property(STAGE_PROPERTY, result.stage.clone());
        Ok(self.catalog.commit(branch, changes, meta, Some(head))?)
    }
}
