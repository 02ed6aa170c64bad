//! Run identity for tracking pipeline executions.

use crate::utils::{generate_job_id, short_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run.
///
/// The job id is recorded in the properties of every commit the run makes,
/// so a table version can always be traced back to the run that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique id of the run.
    pub job_id: Uuid,
    /// Name of the pipeline being run.
    pub pipeline: String,
    /// Who started the run.
    pub author: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates an identity with a fresh job id.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, author: impl Into<String>) -> Self {
        Self::with_job_id(generate_job_id(), pipeline, author)
    }

    /// Creates an identity with a specific job id.
    #[must_use]
    pub fn with_job_id(job_id: Uuid, pipeline: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            job_id,
            pipeline: pipeline.into(),
            author: author.into(),
            started_at: Utc::now(),
        }
    }

    /// Short form of the job id.
    #[must_use]
    pub fn short_id(&self) -> String {
        short_id(&self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_identity_new() {
        let identity = RunIdentity::new("quick_start", "ada");
        assert_eq!(identity.pipeline, "quick_start");
        assert_eq!(identity.author, "ada");
        assert_eq!(identity.short_id().len(), 8);
        assert!(identity.job_id.to_string().ends_with(&identity.short_id()));
    }

    #[test]
    fn test_run_identity_serialization() {
        let identity = RunIdentity::new("p", "ada");
        let json = serde_json::to_string(&identity).unwrap();
        let deserialized: RunIdentity = serde_json::from_str(&json).unwrap();

        assert_eq!(identity, deserialized);
    }
}
