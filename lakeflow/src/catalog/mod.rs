//! The versioned catalog.
//!
//! Branches and tags point at commits; a commit is an immutable snapshot of
//! artifact names to content-addressed tables. A run writes to its own
//! branch and becomes visible on the target only when it is merged.

mod commit;
mod memory;
mod refs;

pub use commit::{Commit, CommitFilter, CommitMeta, MergeOutcome, TableChange, TableChanges, JOB_ID_PROPERTY};
pub use memory::MemoryCatalog;
pub use refs::{RefSpec, MIN_COMMIT_PREFIX};

use crate::table::Table;
use std::sync::Arc;
use thiserror::Error;

/// The branch every catalog starts with.
pub const MAIN_BRANCH: &str = "main";

/// Errors raised by catalog operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A branch, tag or table name is malformed.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// The branch does not exist.
    #[error("branch '{0}' not found")]
    BranchNotFound(String),

    /// A branch or tag with this name already exists.
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    /// The tag does not exist.
    #[error("tag '{0}' not found")]
    TagNotFound(String),

    /// A tag or branch with this name already exists.
    #[error("tag '{0}' already exists")]
    TagExists(String),

    /// The reference names no branch, tag or commit.
    #[error("reference '{0}' not found")]
    RefNotFound(String),

    /// A commit prefix matches more than one commit.
    #[error("reference '{0}' is ambiguous")]
    AmbiguousRef(String),

    /// The table does not exist at the reference.
    #[error("table '{table}' not found at '{reference}'")]
    TableNotFound {
        /// Table name.
        table: String,
        /// Reference that was searched.
        reference: String,
    },

    /// The table already exists and replacing it was not allowed.
    #[error("table '{table}' already exists on branch '{branch}'")]
    TableExists {
        /// Table name.
        table: String,
        /// Branch holding it.
        branch: String,
    },

    /// The branch head changed since the caller last read it.
    #[error("branch '{branch}' moved: expected head {expected}, found {actual}")]
    HeadMoved {
        /// Branch name.
        branch: String,
        /// Head the caller expected.
        expected: String,
        /// Actual head.
        actual: String,
    },

    /// A merge found tables changed on both sides.
    #[error("merge conflict on tables: {}", tables.join(", "))]
    Conflict {
        /// Tables changed differently on both sides.
        tables: Vec<String>,
    },

    /// The branch may not be deleted.
    #[error("branch '{0}' is protected")]
    ProtectedBranch(String),

    /// The catalog file could not be read or written.
    #[error("catalog storage error: {0}")]
    Storage(String),
}

/// A branching, versioned store of named tables.
///
/// Every mutation is atomic: it either takes effect completely or leaves
/// the catalog untouched.
pub trait Catalog: Send + Sync {
    /// Creates `name` pointing at the commit `from_ref` resolves to, and
    /// returns that commit.
    fn create_branch(&self, name: &str, from_ref: &str) -> Result<Commit, CatalogError>;

    /// Deletes a branch. Commits stay reachable through tags and ids.
    fn delete_branch(&self, name: &str) -> Result<(), CatalogError>;

    /// Returns true if the branch exists.
    fn has_branch(&self, name: &str) -> bool;

    /// Branch names and head ids, sorted by name.
    fn list_branches(&self) -> Vec<(String, String)>;

    /// Creates an immutable tag on the commit `reference` resolves to.
    fn create_tag(&self, name: &str, reference: &str) -> Result<Commit, CatalogError>;

    /// Deletes a tag.
    fn delete_tag(&self, name: &str) -> Result<(), CatalogError>;

    /// Returns true if the tag exists.
    fn has_tag(&self, name: &str) -> bool;

    /// The commit a tag points at.
    fn get_tag(&self, name: &str) -> Result<Commit, CatalogError>;

    /// Tag names and commit ids, sorted by name.
    fn list_tags(&self) -> Vec<(String, String)>;

    /// Resolves a branch, tag or `@<commit>` reference.
    fn resolve(&self, reference: &str) -> Result<Commit, CatalogError>;

    /// Returns true if the table exists at `reference`.
    fn has_table(&self, name: &str, reference: &str) -> Result<bool, CatalogError> {
        Ok(self.resolve(reference)?.tables.contains_key(name))
    }

    /// Reads a table at `reference`.
    fn get_table(&self, name: &str, reference: &str) -> Result<Arc<Table>, CatalogError>;

    /// Table names at `reference`, sorted.
    fn list_tables(&self, reference: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self.resolve(reference)?.tables.into_keys().collect())
    }

    /// Applies `changes` to `branch` as one commit.
    ///
    /// When `expected_head` is given the commit only happens if the branch
    /// head still equals it.
    fn commit(
        &self,
        branch: &str,
        changes: TableChanges,
        meta: CommitMeta,
        expected_head: Option<&str>,
    ) -> Result<Commit, CatalogError>;

    /// Merges `source` into `into`: a fast-forward when possible, otherwise
    /// a table-level three-way merge that fails on conflicting changes.
    fn merge_branch(&self, source: &str, into: &str, meta: CommitMeta) -> Result<MergeOutcome, CatalogError>;

    /// Deletes a table from a branch.
    fn delete_table(&self, name: &str, branch: &str, meta: CommitMeta) -> Result<Commit, CatalogError> {
        let mut changes = TableChanges::new();
        changes.insert(name.to_string(), TableChange::Delete);
        self.commit(branch, changes, meta, None)
    }

    /// Restores the version of `name` found at `source_ref` onto
    /// `into_branch`. Fails if the table exists there unless `replace` is set.
    fn revert_table(
        &self,
        name: &str,
        source_ref: &str,
        into_branch: &str,
        meta: CommitMeta,
        replace: bool,
    ) -> Result<Commit, CatalogError>;

    /// First-parent history from `reference`, newest first.
    fn get_commits(&self, reference: &str, filter: &CommitFilter) -> Result<Vec<Commit>, CatalogError>;

    /// The newest commit made by job `job_id`.
    fn commit_by_job_id(&self, job_id: &str) -> Option<Commit>;
}
