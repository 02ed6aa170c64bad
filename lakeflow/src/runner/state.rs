//! The record of a finished run.

use crate::pipeline::{ExpectationResult, StageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage succeeded and every persisted output was committed.
    Success,
    /// A stage, an asserted expectation or a commit failed.
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a caller needs to audit, promote or debug a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Id recorded on every commit of the run.
    pub job_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Outcome.
    pub status: RunStatus,
    /// Branch the run forked from.
    pub target_branch: String,
    /// Branch holding the run's results.
    pub run_branch: String,
    /// Target head at fork time.
    pub fork_head: String,
    /// Per-stage results in execution order.
    pub stages: Vec<StageResult>,
    /// Results of every expectation that ran.
    pub expectations: Vec<ExpectationResult>,
    /// The stage that failed, if any.
    pub failed_stage: Option<String>,
    /// Why the run failed.
    pub error: Option<String>,
    /// Ids of the commits made on the run branch, oldest first.
    pub commits: Vec<String>,
    /// Whether the run branch has been merged into the target.
    pub promoted: bool,
    /// Wall time of graph execution.
    pub duration_ms: f64,
}

impl RunState {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Looks up a stage result.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// Expectations that did not pass, whatever their policy.
    pub fn failed_expectations(&self) -> impl Iterator<Item = &ExpectationResult> {
        self.expectations.iter().filter(|e| !e.passed)
    }
}
