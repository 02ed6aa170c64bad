//! Reading and writing project directories.

use super::{ProjectDescriptor, ProjectError, PROJECT_FILE};
use crate::sql::SqlStageFile;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Loads `lakeflow_project.toml` and every `*.sql` file in `dir`.
///
/// SQL files are read in name order; each one becomes a stage named after
/// its file stem.
///
/// # Errors
///
/// Returns an I/O error, a descriptor validation error, or
/// [`ProjectError::Sql`] for a SQL file that does not parse.
pub fn load(dir: impl AsRef<Path>) -> Result<ProjectDescriptor, ProjectError> {
    let dir = dir.as_ref();
    let path = dir.join(PROJECT_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ProjectError::io(&path, &e))?;
    let mut project = ProjectDescriptor::parse(&text)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ProjectError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path.to_path_buf());
        }
    }

    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = fs::read_to_string(&path).map_err(|e| ProjectError::io(&path, &e))?;
        let file = SqlStageFile::parse(stem, &text).map_err(|error| ProjectError::Sql {
            file: stem.to_string(),
            error,
        })?;
        project.add_sql(file)?;
    }

    tracing::debug!(
        project = %project.project.name,
        stages = project.stages.len(),
        sql_stages = project.sql_stages().len(),
        expectations = project.expectations.len(),
        "Loaded project"
    );
    Ok(project)
}

/// Writes the descriptor to `dir/lakeflow_project.toml`. SQL files are
/// left alone.
///
/// # Errors
///
/// Returns an I/O or serialization error.
pub fn save(project: &ProjectDescriptor, dir: impl AsRef<Path>) -> Result<(), ProjectError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| ProjectError::io(dir, &e))?;
    let path = dir.join(PROJECT_FILE);
    fs::write(&path, project.to_toml()?).map_err(|e| ProjectError::io(&path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Materialization;
    use tempfile::TempDir;

    #[test]
    fn test_load_with_sql_files() {
        let dir = TempDir::new().unwrap();
        let mut project = ProjectDescriptor::new("taxi");
        project.set_parameter("min_trips", "5", false).unwrap();
        save(&project, dir.path()).unwrap();

        fs::write(
            dir.path().join("zones.sql"),
            "-- lakeflow: materialize=replace\nSELECT zone FROM trips",
        )
        .unwrap();
        fs::write(dir.path().join("busy.sql"), "SELECT zone FROM zones").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.project, project.project);
        let names: Vec<&str> = loaded.sql_stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["busy", "zones"]);
        assert_eq!(loaded.sql_stages()[1].materialize, Materialization::Replace);

        let graph = loaded.into_pipeline().unwrap().build().unwrap();
        assert_eq!(graph.execution_order(), vec!["zones", "busy"]);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(load(dir.path()), Err(ProjectError::Io { .. })));

        save(&ProjectDescriptor::new("broken"), dir.path()).unwrap();
        fs::write(dir.path().join("bad.sql"), "DELETE FROM trips").unwrap();
        assert!(matches!(load(dir.path()), Err(ProjectError::Sql { file, .. }) if file == "bad"));
    }
}
