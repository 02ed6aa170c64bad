//! The stage that runs a [`Check`].

use super::Check;
use crate::context::StageContext;
use crate::errors::StageError;
use crate::stages::Stage;
use crate::table::{Table, Value};
use async_trait::async_trait;
use tracing::debug;

/// Evaluates a [`Check`] over a single input.
#[derive(Debug, Clone)]
pub struct ExpectationStage {
    name: String,
    input: String,
    check: Check,
}

impl ExpectationStage {
    /// Creates an expectation named `name` checking `input`.
    #[must_use]
    pub fn new(name: impl Into<String>, input: impl Into<String>, check: Check) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            check,
        }
    }

    /// The checked input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The check.
    #[must_use]
    pub fn check(&self) -> &Check {
        &self.check
    }
}

#[async_trait]
impl Stage for ExpectationStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<Table, StageError> {
        let table = ctx.input(&self.input)?;
        let passed = self
            .check
            .evaluate(&table)
            .map_err(|e| ctx.error(format!("cannot evaluate '{}': {e}", self.check)))?;
        debug!(expectation = %self.name, check = %self.check, passed, "Evaluated expectation");
        Table::from_columns(vec![
            ("expectation", vec![Value::Str(self.name.clone())]),
            ("passed", vec![Value::Bool(passed)]),
        ])
        .map_err(|e| ctx.error(e.to_string()))
    }
}
