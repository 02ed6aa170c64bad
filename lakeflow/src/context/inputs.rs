//! Stage inputs with strictness enforcement.

use crate::errors::UndeclaredInputError;
use crate::table::Table;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// The tables a stage may read, keyed by artifact name.
///
/// In strict mode, reading a name the stage never declared is an error even
/// when the table happens to be available.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    tables: HashMap<String, Arc<Table>>,
    declared: BTreeSet<String>,
    stage_name: String,
    strict: bool,
}

impl StageInputs {
    /// Creates strict inputs for `stage_name`.
    #[must_use]
    pub fn new(
        tables: HashMap<String, Arc<Table>>,
        declared: impl IntoIterator<Item = impl Into<String>>,
        stage_name: impl Into<String>,
    ) -> Self {
        Self {
            tables,
            declared: declared.into_iter().map(Into::into).collect(),
            stage_name: stage_name.into(),
            strict: true,
        }
    }

    /// Creates inputs where every available table counts as declared.
    #[must_use]
    pub fn permissive(tables: HashMap<String, Arc<Table>>, stage_name: impl Into<String>) -> Self {
        Self {
            declared: tables.keys().cloned().collect(),
            tables,
            stage_name: stage_name.into(),
            strict: false,
        }
    }

    /// Gets a declared input.
    ///
    /// # Errors
    ///
    /// Returns [`UndeclaredInputError`] in strict mode if `name` was not
    /// declared.
    pub fn get(&self, name: &str) -> Result<Option<Arc<Table>>, UndeclaredInputError> {
        if self.strict && !self.declared.contains(name) {
            return Err(UndeclaredInputError::new(&self.stage_name, name));
        }
        Ok(self.tables.get(name).cloned())
    }

    /// Checks if a table is available under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// The declared input names, sorted.
    #[must_use]
    pub fn declared(&self) -> &BTreeSet<String> {
        &self.declared
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn tables() -> HashMap<String, Arc<Table>> {
        let t = Arc::new(Table::from_columns(vec![("a", vec![Value::Int(1)])]).unwrap());
        let mut map = HashMap::new();
        map.insert("raw_events".to_string(), Arc::clone(&t));
        map.insert("zones".to_string(), t);
        map
    }

    #[test]
    fn test_permissive_access() {
        let inputs = StageInputs::permissive(tables(), "current");

        assert!(inputs.get("raw_events").unwrap().is_some());
        assert!(inputs.get("zones").unwrap().is_some());
        assert!(inputs.get("other").unwrap().is_none());
    }

    #[test]
    fn test_strict_rejects_undeclared() {
        let inputs = StageInputs::new(tables(), ["raw_events"], "clean");

        assert!(inputs.get("raw_events").unwrap().is_some());
        assert!(inputs.contains("zones"));

        let err = inputs.get("zones").unwrap_err();
        assert_eq!(err.stage, "clean");
        assert_eq!(err.input, "zones");
    }
}
