//! Commits, commit metadata and history filters.

use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Commit property holding the id of the job that made the commit.
pub const JOB_ID_PROPERTY: &str = "lakeflow.job_id";

/// An immutable catalog snapshot.
///
/// The snapshot maps artifact names to table content hashes; the tables
/// themselves are stored once, content-addressed, so commits only ever copy
/// pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Hex SHA-256 id.
    pub id: String,
    /// Parent ids; two for a merge commit, none for the root.
    pub parents: Vec<String>,
    /// Commit message.
    pub message: String,
    /// Commit author.
    pub author: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Free-form properties.
    pub properties: BTreeMap<String, String>,
    /// Artifact name to table content hash.
    pub tables: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CommitDigest<'a> {
    parents: &'a [String],
    message: &'a str,
    author: &'a str,
    timestamp: &'a DateTime<Utc>,
    properties: &'a BTreeMap<String, String>,
    tables: &'a BTreeMap<String, String>,
}

impl Commit {
    pub(crate) fn new(parents: Vec<String>, meta: CommitMeta, tables: BTreeMap<String, String>) -> Self {
        let timestamp = Utc::now();
        let digest = CommitDigest {
            parents: &parents,
            message: &meta.message,
            author: &meta.author,
            timestamp: &timestamp,
            properties: &meta.properties,
            tables: &tables,
        };
        let mut hasher = Sha256::new();
        if let Ok(bytes) = serde_json::to_vec(&digest) {
            hasher.update(bytes);
        }
        Self {
            id: hex::encode(hasher.finalize()),
            parents,
            message: meta.message,
            author: meta.author,
            timestamp,
            properties: meta.properties,
            tables,
        }
    }

    /// The first twelve hex digits of the id.
    #[must_use]
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }

    /// The first parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    /// The job that made this commit, if a run made it.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        self.properties.get(JOB_ID_PROPERTY).map(String::as_str)
    }
}

/// Message, author and properties of a commit to be made.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitMeta {
    /// Commit message.
    pub message: String,
    /// Commit author.
    pub author: String,
    /// Free-form properties.
    pub properties: BTreeMap<String, String>,
}

impl CommitMeta {
    /// Creates commit metadata.
    #[must_use]
    pub fn new(message: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Records the job that makes the commit.
    #[must_use]
    pub fn with_job_id(self, job_id: &Uuid) -> Self {
        self.with_property(JOB_ID_PROPERTY, job_id.to_string())
    }
}

/// A change to one table in a commit.
#[derive(Debug, Clone)]
pub enum TableChange {
    /// Create or replace the table.
    Put(Arc<Table>),
    /// Remove the table.
    Delete,
}

/// Changes keyed by table name.
pub type TableChanges = BTreeMap<String, TableChange>;

/// Filter for [`Catalog::get_commits`](super::Catalog::get_commits).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitFilter {
    /// Keep only commits by this author.
    pub author: Option<String>,
    /// Keep at most this many commits.
    pub limit: Option<usize>,
}

impl CommitFilter {
    /// Keeps only commits by `author`.
    #[must_use]
    pub fn by_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Keeps at most `limit` commits.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, commit: &Commit) -> bool {
        self.author.as_deref().map_or(true, |a| a == commit.author)
    }
}

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The target already contained the source.
    UpToDate(Commit),
    /// The target head moved forward to the source head.
    FastForward(Commit),
    /// A merge commit was created on the target.
    Merged(Commit),
}

impl MergeOutcome {
    /// The target head after the merge.
    #[must_use]
    pub fn commit(&self) -> &Commit {
        match self {
            Self::UpToDate(c) | Self::FastForward(c) | Self::Merged(c) => c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_ids_are_distinct() {
        let meta = CommitMeta::new("first", "ada");
        let a = Commit::new(Vec::new(), meta.clone(), BTreeMap::new());
        let b = Commit::new(vec![a.id.clone()], meta, BTreeMap::new());

        assert_eq!(a.id.len(), 64);
        assert_ne!(a.id, b.id);
        assert_eq!(b.parent(), Some(a.id.as_str()));
        assert_eq!(a.short_id().len(), 12);
    }

    #[test]
    fn test_job_id_property() {
        let job = Uuid::new_v4();
        let commit = Commit::new(Vec::new(), CommitMeta::new("m", "ada").with_job_id(&job), BTreeMap::new());
        assert_eq!(commit.job_id(), Some(job.to_string().as_str()));
    }

    #[test]
    fn test_filter_matches_author() {
        let commit = Commit::new(Vec::new(), CommitMeta::new("m", "ada"), BTreeMap::new());
        assert!(CommitFilter::default().matches(&commit));
        assert!(CommitFilter::default().by_author("ada").matches(&commit));
        assert!(!CommitFilter::default().by_author("bob").matches(&commit));
    }
}
