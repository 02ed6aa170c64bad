//! In-memory catalog with optional JSON file persistence.

use super::refs::{is_commit_prefix, RefSpec};
use super::{
    Catalog, CatalogError, Commit, CommitFilter, CommitMeta, MergeOutcome, TableChange, TableChanges, MAIN_BRANCH,
};
use crate::table::Table;
use crate::utils::is_valid_ref_name;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogState {
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    commits: HashMap<String, Commit>,
    /// Content hash to table.
    tables: HashMap<String, Arc<Table>>,
}

impl CatalogState {
    fn initial() -> Self {
        let root = Commit::new(Vec::new(), CommitMeta::new("Initialize catalog", "lakeflow"), BTreeMap::new());
        let mut state = Self::default();
        state.branches.insert(MAIN_BRANCH.to_string(), root.id.clone());
        state.commits.insert(root.id.clone(), root);
        state
    }

    fn commit(&self, id: &str) -> Result<&Commit, CatalogError> {
        self.commits
            .get(id)
            .ok_or_else(|| CatalogError::Storage(format!("dangling commit id {id}")))
    }

    fn resolve(&self, reference: &str) -> Result<&Commit, CatalogError> {
        match RefSpec::parse(reference) {
            RefSpec::Name(name) => {
                let id = self
                    .branches
                    .get(name)
                    .or_else(|| self.tags.get(name))
                    .ok_or_else(|| CatalogError::RefNotFound(reference.to_string()))?;
                self.commit(id)
            }
            RefSpec::Commit(prefix) => {
                if !is_commit_prefix(prefix) {
                    return Err(CatalogError::RefNotFound(reference.to_string()));
                }
                let prefix = prefix.to_ascii_lowercase();
                let mut matches = self.commits.values().filter(|c| c.id.starts_with(&prefix));
                let first = matches
                    .next()
                    .ok_or_else(|| CatalogError::RefNotFound(reference.to_string()))?;
                if matches.next().is_some() {
                    return Err(CatalogError::AmbiguousRef(reference.to_string()));
                }
                Ok(first)
            }
        }
    }

    fn head(&self, branch: &str) -> Result<&Commit, CatalogError> {
        let id = self
            .branches
            .get(branch)
            .ok_or_else(|| CatalogError::BranchNotFound(branch.to_string()))?;
        self.commit(id)
    }

    fn ancestors(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&next) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Nearest common ancestor, searching breadth-first from `a`.
    fn merge_base(&self, a: &str, b: &str) -> Option<String> {
        let of_b = self.ancestors(b);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([a.to_string()]);
        while let Some(next) = queue.pop_front() {
            if of_b.contains(&next) {
                return Some(next);
            }
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&next) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        None
    }

    fn push_commit(&mut self, branch: &str, commit: Commit) -> Commit {
        self.branches.insert(branch.to_string(), commit.id.clone());
        self.commits.insert(commit.id.clone(), commit.clone());
        commit
    }
}

/// A [`Catalog`] held in memory.
///
/// Created with [`MemoryCatalog::open`], every mutation is also written to
/// a JSON file: the new state goes to a temporary file that is then renamed
/// over the old one, and the in-memory state only changes once the write
/// succeeded.
#[derive(Debug)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    path: Option<PathBuf>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Creates an empty catalog with a `main` branch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::initial()),
            path: None,
        }
    }

    /// Opens the catalog stored at `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Storage`] if the file cannot be read, parsed
    /// or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| storage_error(&path, &e))?;
            let state: CatalogState = serde_json::from_slice(&bytes).map_err(|e| storage_error(&path, &e))?;
            debug!(path = %path.display(), commits = state.commits.len(), "Opened catalog");
            state
        } else {
            let state = CatalogState::initial();
            write_snapshot(&path, &state)?;
            info!(path = %path.display(), "Created catalog");
            state
        };
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// The backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Head commit id of a branch.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::BranchNotFound`] for unknown branches.
    pub fn branch_head(&self, branch: &str) -> Result<String, CatalogError> {
        Ok(self.state.read().head(branch)?.id.clone())
    }

    /// Runs `op` on a copy of the state and installs the copy only if `op`
    /// and the snapshot write both succeed.
    fn mutate<T>(&self, op: impl FnOnce(&mut CatalogState) -> Result<T, CatalogError>) -> Result<T, CatalogError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let out = op(&mut next)?;
        if let Some(path) = &self.path {
            write_snapshot(path, &next)?;
        }
        *state = next;
        Ok(out)
    }
}

fn storage_error(path: &Path, err: &dyn std::fmt::Display) -> CatalogError {
    CatalogError::Storage(format!("{}: {err}", path.display()))
}

fn write_snapshot(path: &Path, state: &CatalogState) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| storage_error(parent, &e))?;
    }
    let bytes = serde_json::to_vec(state).map_err(|e| storage_error(path, &e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| storage_error(&tmp, &e))?;
    std::fs::rename(&tmp, path).map_err(|e| storage_error(path, &e))
}

fn check_name(name: &str) -> Result<(), CatalogError> {
    if is_valid_ref_name(name) {
        Ok(())
    } else {
        Err(CatalogError::InvalidName(name.to_string()))
    }
}

impl Catalog for MemoryCatalog {
    fn create_branch(&self, name: &str, from_ref: &str) -> Result<Commit, CatalogError> {
        check_name(name)?;
        self.mutate(|state| {
            if state.branches.contains_key(name) {
                return Err(CatalogError::BranchExists(name.to_string()));
            }
            if state.tags.contains_key(name) {
                return Err(CatalogError::TagExists(name.to_string()));
            }
            let commit = state.resolve(from_ref)?.clone();
            state.branches.insert(name.to_string(), commit.id.clone());
            debug!(branch = name, from = from_ref, head = commit.short_id(), "Created branch");
            Ok(commit)
        })
    }

    fn delete_branch(&self, name: &str) -> Result<(), CatalogError> {
        if name == MAIN_BRANCH {
            return Err(CatalogError::ProtectedBranch(name.to_string()));
        }
        self.mutate(|state| {
            state
                .branches
                .remove(name)
                .map(|_| debug!(branch = name, "Deleted branch"))
                .ok_or_else(|| CatalogError::BranchNotFound(name.to_string()))
        })
    }

    fn has_branch(&self, name: &str) -> bool {
        self.state.read().branches.contains_key(name)
    }

    fn list_branches(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .branches
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect()
    }

    fn create_tag(&self, name: &str, reference: &str) -> Result<Commit, CatalogError> {
        check_name(name)?;
        self.mutate(|state| {
            if state.tags.contains_key(name) {
                return Err(CatalogError::TagExists(name.to_string()));
            }
            if state.branches.contains_key(name) {
                return Err(CatalogError::BranchExists(name.to_string()));
            }
            let commit = state.resolve(reference)?.clone();
            state.tags.insert(name.to_string(), commit.id.clone());
            Ok(commit)
        })
    }

    fn delete_tag(&self, name: &str) -> Result<(), CatalogError> {
        self.mutate(|state| {
            state
                .tags
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| CatalogError::TagNotFound(name.to_string()))
        })
    }

    fn has_tag(&self, name: &str) -> bool {
        self.state.read().tags.contains_key(name)
    }

    fn get_tag(&self, name: &str) -> Result<Commit, CatalogError> {
        let state = self.state.read();
        let id = state
            .tags
            .get(name)
            .ok_or_else(|| CatalogError::TagNotFound(name.to_string()))?;
        state.commit(id).cloned()
    }

    fn list_tags(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .tags
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect()
    }

    fn resolve(&self, reference: &str) -> Result<Commit, CatalogError> {
        self.state.read().resolve(reference).cloned()
    }

    fn get_table(&self, name: &str, reference: &str) -> Result<Arc<Table>, CatalogError> {
        let state = self.state.read();
        let commit = state.resolve(reference)?;
        let hash = commit.tables.get(name).ok_or_else(|| CatalogError::TableNotFound {
            table: name.to_string(),
            reference: reference.to_string(),
        })?;
        state
            .tables
            .get(hash)
            .cloned()
            .ok_or_else(|| CatalogError::Storage(format!("missing table content {hash}")))
    }

    fn commit(
        &self,
        branch: &str,
        changes: TableChanges,
        meta: CommitMeta,
        expected_head: Option<&str>,
    ) -> Result<Commit, CatalogError> {
        for name in changes.keys() {
            check_name(name)?;
        }
        self.mutate(|state| {
            let head = state.head(branch)?;
            if let Some(expected) = expected_head {
                if expected != head.id {
                    return Err(CatalogError::HeadMoved {
                        branch: branch.to_string(),
                        expected: expected.to_string(),
                        actual: head.id.clone(),
                    });
                }
            }
            let parent = head.id.clone();
            let mut tables = head.tables.clone();
            for (name, change) in changes {
                match change {
                    TableChange::Put(table) => {
                        let hash = table.content_hash();
                        state.tables.entry(hash.clone()).or_insert(table);
                        tables.insert(name, hash);
                    }
                    TableChange::Delete => {
                        if tables.remove(&name).is_none() {
                            return Err(CatalogError::TableNotFound {
                                table: name,
                                reference: branch.to_string(),
                            });
                        }
                    }
                }
            }
            let commit = state.push_commit(branch, Commit::new(vec![parent], meta, tables));
            debug!(branch, commit = commit.short_id(), "Committed");
            Ok(commit)
        })
    }

    fn merge_branch(&self, source: &str, into: &str, meta: CommitMeta) -> Result<MergeOutcome, CatalogError> {
        self.mutate(|state| {
            let source_head = state.head(source)?.clone();
            let into_head = state.head(into)?.clone();

            if state.ancestors(&into_head.id).contains(&source_head.id) {
                return Ok(MergeOutcome::UpToDate(into_head));
            }
            if state.ancestors(&source_head.id).contains(&into_head.id) {
                state.branches.insert(into.to_string(), source_head.id.clone());
                info!(source, into, head = source_head.short_id(), "Fast-forward merge");
                return Ok(MergeOutcome::FastForward(source_head));
            }

            let base_tables = state
                .merge_base(&source_head.id, &into_head.id)
                .and_then(|id| state.commits.get(&id))
                .map(|c| c.tables.clone())
                .unwrap_or_default();
            let names: BTreeSet<&String> = base_tables
                .keys()
                .chain(source_head.tables.keys())
                .chain(into_head.tables.keys())
                .collect();

            let mut merged = BTreeMap::new();
            let mut conflicts = Vec::new();
            for name in names {
                let base = base_tables.get(name);
                let ours = into_head.tables.get(name);
                let theirs = source_head.tables.get(name);
                let pick = if theirs == base || theirs == ours {
                    ours
                } else if ours == base {
                    theirs
                } else {
                    conflicts.push(name.clone());
                    continue;
                };
                if let Some(hash) = pick {
                    merged.insert(name.clone(), hash.clone());
                }
            }
            if !conflicts.is_empty() {
                return Err(CatalogError::Conflict { tables: conflicts });
            }

            let commit = state.push_commit(
                into,
                Commit::new(vec![into_head.id.clone(), source_head.id.clone()], meta, merged),
            );
            info!(source, into, commit = commit.short_id(), "Three-way merge");
            Ok(MergeOutcome::Merged(commit))
        })
    }

    fn revert_table(
        &self,
        name: &str,
        source_ref: &str,
        into_branch: &str,
        meta: CommitMeta,
        replace: bool,
    ) -> Result<Commit, CatalogError> {
        self.mutate(|state| {
            let hash = state
                .resolve(source_ref)?
                .tables
                .get(name)
                .cloned()
                .ok_or_else(|| CatalogError::TableNotFound {
                    table: name.to_string(),
                    reference: source_ref.to_string(),
                })?;
            let head = state.head(into_branch)?;
            if !replace && head.tables.contains_key(name) {
                return Err(CatalogError::TableExists {
                    table: name.to_string(),
                    branch: into_branch.to_string(),
                });
            }
            let parent = head.id.clone();
            let mut tables = head.tables.clone();
            tables.insert(name.to_string(), hash);
            let commit = state.push_commit(into_branch, Commit::new(vec![parent], meta, tables));
            info!(table = name, from = source_ref, into = into_branch, "Reverted table");
            Ok(commit)
        })
    }

    fn get_commits(&self, reference: &str, filter: &CommitFilter) -> Result<Vec<Commit>, CatalogError> {
        let state = self.state.read();
        let mut current = Some(state.resolve(reference)?);
        let mut out = Vec::new();
        while let Some(commit) = current {
            if filter.limit.is_some_and(|limit| out.len() >= limit) {
                break;
            }
            if filter.matches(commit) {
                out.push(commit.clone());
            }
            current = commit.parent().and_then(|id| state.commits.get(id));
        }
        Ok(out)
    }

    fn commit_by_job_id(&self, job_id: &str) -> Option<Commit> {
        self.state
            .read()
            .commits
            .values()
            .filter(|c| c.job_id() == Some(job_id))
            .max_by_key(|c| c.timestamp)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use pretty_assertions::assert_eq;

    fn table(values: &[i64]) -> Arc<Table> {
        Arc::new(Table::from_columns(vec![("n", values.iter().map(|&v| Value::Int(v)).collect())]).unwrap())
    }

    fn put(catalog: &MemoryCatalog, branch: &str, name: &str, values: &[i64]) -> Commit {
        let mut changes = TableChanges::new();
        changes.insert(name.to_string(), TableChange::Put(table(values)));
        catalog
            .commit(branch, changes, CommitMeta::new(format!("write {name}"), "ada"), None)
            .unwrap()
    }

    #[test]
    fn test_new_catalog_has_main() {
        let catalog = MemoryCatalog::new();
        assert!(catalog.has_branch(MAIN_BRANCH));
        assert!(catalog.list_tables(MAIN_BRANCH).unwrap().is_empty());
        assert_eq!(catalog.get_commits(MAIN_BRANCH, &CommitFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_branches_are_isolated() {
        let catalog = MemoryCatalog::new();
        put(&catalog, MAIN_BRANCH, "events", &[1, 2]);
        catalog.create_branch("dev", MAIN_BRANCH).unwrap();
        put(&catalog, "dev", "events", &[1, 2, 3]);

        assert_eq!(catalog.get_table("events", MAIN_BRANCH).unwrap().num_rows(), 2);
        assert_eq!(catalog.get_table("events", "dev").unwrap().num_rows(), 3);
    }

    #[test]
    fn test_branch_and_tag_rules() {
        let catalog = MemoryCatalog::new();
        assert_eq!(
            catalog.create_branch("bad name", MAIN_BRANCH),
            Err(CatalogError::InvalidName("bad name".to_string()))
        );
        assert_eq!(
            catalog.create_branch(MAIN_BRANCH, MAIN_BRANCH),
            Err(CatalogError::BranchExists(MAIN_BRANCH.to_string()))
        );
        assert_eq!(
            catalog.delete_branch(MAIN_BRANCH),
            Err(CatalogError::ProtectedBranch(MAIN_BRANCH.to_string()))
        );
        assert_eq!(
            catalog.create_branch("dev", "nope"),
            Err(CatalogError::RefNotFound("nope".to_string()))
        );

        catalog.create_tag("v1", MAIN_BRANCH).unwrap();
        assert!(catalog.has_tag("v1"));
        assert_eq!(catalog.create_branch("v1", MAIN_BRANCH), Err(CatalogError::TagExists("v1".to_string())));
        catalog.delete_tag("v1").unwrap();
        assert_eq!(catalog.delete_tag("v1"), Err(CatalogError::TagNotFound("v1".to_string())));
    }

    #[test]
    fn test_time_travel_by_tag_and_commit() {
        let catalog = MemoryCatalog::new();
        let first = put(&catalog, MAIN_BRANCH, "events", &[1]);
        catalog.create_tag("before", MAIN_BRANCH).unwrap();
        put(&catalog, MAIN_BRANCH, "events", &[1, 2, 3]);

        assert_eq!(catalog.get_table("events", "before").unwrap().num_rows(), 1);
        let at_commit = format!("@{}", &first.id[..10]);
        assert_eq!(catalog.get_table("events", &at_commit).unwrap().num_rows(), 1);
        assert_eq!(catalog.get_table("events", MAIN_BRANCH).unwrap().num_rows(), 3);
        assert_eq!(catalog.get_tag("before").unwrap().id, first.id);
    }

    #[test]
    fn test_commit_compare_and_swap() {
        let catalog = MemoryCatalog::new();
        let head = catalog.branch_head(MAIN_BRANCH).unwrap();
        put(&catalog, MAIN_BRANCH, "a", &[1]);

        let mut changes = TableChanges::new();
        changes.insert("b".to_string(), TableChange::Put(table(&[2])));
        let err = catalog
            .commit(MAIN_BRANCH, changes, CommitMeta::new("late", "ada"), Some(&head))
            .unwrap_err();
        assert!(matches!(err, CatalogError::HeadMoved { .. }));
        assert!(!catalog.has_table("b", MAIN_BRANCH).unwrap());
    }

    #[test]
    fn test_fast_forward_merge() {
        let catalog = MemoryCatalog::new();
        catalog.create_branch("run", MAIN_BRANCH).unwrap();
        let written = put(&catalog, "run", "out", &[1]);

        let outcome = catalog.merge_branch("run", MAIN_BRANCH, CommitMeta::new("merge", "ada")).unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward(written.clone()));
        assert_eq!(catalog.branch_head(MAIN_BRANCH).unwrap(), written.id);

        let again = catalog.merge_branch("run", MAIN_BRANCH, CommitMeta::new("merge", "ada")).unwrap();
        assert!(matches!(again, MergeOutcome::UpToDate(_)));
    }

    #[test]
    fn test_three_way_merge_and_conflict() {
        let catalog = MemoryCatalog::new();
        put(&catalog, MAIN_BRANCH, "shared", &[0]);
        catalog.create_branch("run", MAIN_BRANCH).unwrap();
        put(&catalog, "run", "out", &[1]);
        put(&catalog, MAIN_BRANCH, "other", &[2]);

        let outcome = catalog.merge_branch("run", MAIN_BRANCH, CommitMeta::new("merge", "ada")).unwrap();
        let MergeOutcome::Merged(commit) = outcome else {
            panic!("expected a merge commit");
        };
        assert_eq!(commit.parents.len(), 2);
        assert_eq!(catalog.list_tables(MAIN_BRANCH).unwrap(), vec!["other", "out", "shared"]);

        catalog.create_branch("run2", MAIN_BRANCH).unwrap();
        put(&catalog, "run2", "shared", &[5]);
        put(&catalog, MAIN_BRANCH, "shared", &[6]);
        let before = catalog.branch_head(MAIN_BRANCH).unwrap();
        let err = catalog
            .merge_branch("run2", MAIN_BRANCH, CommitMeta::new("merge", "ada"))
            .unwrap_err();
        assert_eq!(err, CatalogError::Conflict { tables: vec!["shared".to_string()] });
        assert_eq!(catalog.branch_head(MAIN_BRANCH).unwrap(), before);
    }

    #[test]
    fn test_delete_and_revert_table() {
        let catalog = MemoryCatalog::new();
        put(&catalog, MAIN_BRANCH, "events", &[1]);
        catalog.create_tag("v1", MAIN_BRANCH).unwrap();
        put(&catalog, MAIN_BRANCH, "events", &[1, 2]);

        let err = catalog
            .revert_table("events", "v1", MAIN_BRANCH, CommitMeta::new("revert", "ada"), false)
            .unwrap_err();
        assert!(matches!(err, CatalogError::TableExists { .. }));

        catalog
            .revert_table("events", "v1", MAIN_BRANCH, CommitMeta::new("revert", "ada"), true)
            .unwrap();
        assert_eq!(catalog.get_table("events", MAIN_BRANCH).unwrap().num_rows(), 1);

        catalog
            .delete_table("events", MAIN_BRANCH, CommitMeta::new("drop", "ada"))
            .unwrap();
        assert!(!catalog.has_table("events", MAIN_BRANCH).unwrap());
        assert!(catalog.delete_table("events", MAIN_BRANCH, CommitMeta::new("drop", "ada")).is_err());
    }

    #[test]
    fn test_history_filters() {
        let catalog = MemoryCatalog::new();
        put(&catalog, MAIN_BRANCH, "a", &[1]);
        let mut changes = TableChanges::new();
        changes.insert("b".to_string(), TableChange::Put(table(&[2])));
        let job = uuid::Uuid::new_v4();
        catalog
            .commit(MAIN_BRANCH, changes, CommitMeta::new("by bob", "bob").with_job_id(&job), None)
            .unwrap();

        let all = catalog.get_commits(MAIN_BRANCH, &CommitFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "by bob");

        let ada = catalog
            .get_commits(MAIN_BRANCH, &CommitFilter::default().by_author("ada"))
            .unwrap();
        assert_eq!(ada.len(), 1);

        let limited = catalog
            .get_commits(MAIN_BRANCH, &CommitFilter::default().limit(2))
            .unwrap();
        assert_eq!(limited.len(), 2);

        assert_eq!(catalog.commit_by_job_id(&job.to_string()).unwrap().author, "bob");
        assert!(catalog.commit_by_job_id("missing").is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        {
            let catalog = MemoryCatalog::open(&path).unwrap();
            put(&catalog, MAIN_BRANCH, "events", &[1, 2, 3]);
            catalog.create_branch("dev", MAIN_BRANCH).unwrap();
        }

        let reopened = MemoryCatalog::open(&path).unwrap();
        assert!(reopened.has_branch("dev"));
        assert_eq!(reopened.get_table("events", "dev").unwrap().num_rows(), 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_float_tables_reopen_with_same_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let scores = Arc::new(
            Table::from_columns(vec![("score", vec![Value::Float(0.5), Value::Null, Value::Float(-12345.75)])]).unwrap(),
        );
        {
            let catalog = MemoryCatalog::open(&path).unwrap();
            let mut changes = TableChanges::new();
            changes.insert("scores".to_string(), TableChange::Put(scores.clone()));
            catalog
                .commit(MAIN_BRANCH, changes, CommitMeta::new("scores", "ada"), None)
                .unwrap();
        }

        let reopened = MemoryCatalog::open(&path).unwrap();
        let back = reopened.get_table("scores", MAIN_BRANCH).unwrap();
        assert_eq!(back.content_hash(), scores.content_hash());

        // infinities never reach a commit: the table cannot be built
        assert!(Table::from_columns(vec![("score", vec![Value::Float(f64::INFINITY)])]).is_err());
    }
}
