//! Options for a single run.

use crate::catalog::MAIN_BRANCH;
use crate::context::{ParamValue, Parameters};

/// Author recorded when the caller does not name one.
pub const DEFAULT_AUTHOR: &str = "lakeflow";

/// How a run is started.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Branch the run forks from and promotes into.
    pub target: String,
    /// Parameter values visible to every stage.
    pub parameters: Parameters,
    /// Keep the results on the run branch instead of promoting them.
    pub detach: bool,
    /// Author of the commits the run makes.
    pub author: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target: MAIN_BRANCH.to_string(),
            parameters: Parameters::new(),
            detach: false,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

impl RunOptions {
    /// Options targeting `main`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets `branch`.
    #[must_use]
    pub fn on(mut self, branch: impl Into<String>) -> Self {
        self.target = branch.into();
        self
    }

    /// Sets one parameter, overriding any default.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Fills in every parameter not already set.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &Parameters) -> Self {
        for (name, value) in defaults {
            self.parameters
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Skips promotion; results stay on the run branch for auditing.
    #[must_use]
    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }

    /// Sets the commit author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_parameters_win_over_defaults() {
        let mut defaults = Parameters::new();
        defaults.insert("run_id".to_string(), ParamValue::Int(1));
        defaults.insert("region".to_string(), ParamValue::Str("eu".to_string()));

        let options = RunOptions::new()
            .on("dev")
            .parameter("run_id", ParamValue::Int(7))
            .with_defaults(&defaults)
            .detached();

        assert_eq!(options.target, "dev");
        assert!(options.detach);
        assert_eq!(options.parameters["run_id"], ParamValue::Int(7));
        assert_eq!(options.parameters["region"].as_str(), Some("eu"));
        assert_eq!(options.author, DEFAULT_AUTHOR);
    }
}
