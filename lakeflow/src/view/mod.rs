//! Read-only access to materialized artifacts for dashboards.
//!
//! Viewers run independently of pipelines and must cope with branches and
//! tables that do not exist yet, so a missing name is a [`Lookup`] variant
//! rather than an error.

pub mod render;

use crate::catalog::{Catalog, CatalogError};
use crate::table::Table;
use std::fmt;
use std::sync::Arc;

/// The result of looking up an artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The artifact at the requested reference.
    Found(Arc<Table>),
    /// The branch, tag or commit does not exist.
    ContextNotFound(String),
    /// The reference exists but holds no artifact of that name.
    ArtifactNotFound {
        /// The reference that was searched.
        context: String,
        /// The missing artifact.
        artifact: String,
    },
}

impl Lookup {
    /// The table, if it was found.
    #[must_use]
    pub fn table(&self) -> Option<&Arc<Table>> {
        match self {
            Self::Found(table) => Some(table),
            _ => None,
        }
    }

    /// Returns true if the artifact was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(table) => write!(f, "{} rows", table.num_rows()),
            Self::ContextNotFound(context) => write!(f, "'{context}' does not exist yet"),
            Self::ArtifactNotFound { context, artifact } => {
                write!(f, "'{artifact}' has not been materialized on '{context}' yet")
            }
        }
    }
}

/// Fetches artifacts by (context, name).
#[derive(Clone)]
pub struct ArtifactViewer {
    catalog: Arc<dyn Catalog>,
}

impl fmt::Debug for ArtifactViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactViewer").finish_non_exhaustive()
    }
}

impl ArtifactViewer {
    /// Creates a viewer over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Looks up `artifact` at `context` (a branch, tag or `@commit`).
    ///
    /// # Errors
    ///
    /// Only for failures other than a missing name, such as an ambiguous
    /// commit prefix.
    pub fn fetch(&self, context: &str, artifact: &str) -> Result<Lookup, CatalogError> {
        let commit = match self.catalog.resolve(context) {
            Ok(commit) => commit,
            Err(
                CatalogError::BranchNotFound(_) | CatalogError::TagNotFound(_) | CatalogError::RefNotFound(_),
            ) => {
                tracing::debug!(context, artifact, "Context not found");
                return Ok(Lookup::ContextNotFound(context.to_string()));
            }
            Err(e) => return Err(e),
        };

        match self.catalog.get_table(artifact, &format!("@{}", commit.id)) {
            Ok(table) => Ok(Lookup::Found(table)),
            Err(CatalogError::TableNotFound { .. }) => {
                tracing::debug!(context, artifact, "Artifact not found");
                Ok(Lookup::ArtifactNotFound {
                    context: context.to_string(),
                    artifact: artifact.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CommitMeta, MemoryCatalog, TableChange, TableChanges, MAIN_BRANCH};
    use crate::table::Value;

    fn catalog_with_counts() -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        let counts = Table::from_columns(vec![("n", vec![Value::Int(3)])]).unwrap();
        let mut changes = TableChanges::new();
        changes.insert("counts".to_string(), TableChange::Put(Arc::new(counts)));
        catalog
            .commit(MAIN_BRANCH, changes, CommitMeta::new("add counts", "test"), None)
            .unwrap();
        catalog
    }

    #[test]
    fn test_fetch_found_and_missing() {
        let viewer = ArtifactViewer::new(catalog_with_counts());

        let found = viewer.fetch(MAIN_BRANCH, "counts").unwrap();
        assert_eq!(found.table().unwrap().num_rows(), 1);

        let missing = viewer.fetch(MAIN_BRANCH, "hourly").unwrap();
        assert!(matches!(missing, Lookup::ArtifactNotFound { ref artifact, .. } if artifact == "hourly"));
        assert!(missing.to_string().contains("not been materialized"));

        let no_branch = viewer.fetch("feature", "counts").unwrap();
        assert_eq!(no_branch, Lookup::ContextNotFound("feature".to_string()));
        assert!(!viewer.fetch("@deadbeef", "counts").unwrap().is_found());
    }
}
