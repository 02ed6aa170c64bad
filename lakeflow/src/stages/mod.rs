//! Stage trait and implementations.
//!
//! A stage reads its declared input tables from the [`StageContext`] and
//! produces exactly one table. Where that table goes (kept in memory,
//! replacing or appending to a catalog table) is decided at registration,
//! not by the stage.

mod transform;

pub use transform::OpsStage;

use crate::context::StageContext;
use crate::errors::StageError;
use crate::table::Table;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] naming the stage when it cannot produce its
    /// output.
    async fn execute(&self, ctx: &StageContext) -> Result<Table, StageError>;
}

/// A stage backed by a plain function.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> Result<Table, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> Result<Table, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> Result<Table, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> Result<Table, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<Table, StageError> {
        (self.func)(ctx)
    }
}

/// A stage that always returns the same table. Handy for seeding tests.
#[derive(Debug, Clone)]
pub struct ConstStage {
    name: String,
    table: Table,
}

impl ConstStage {
    /// Creates a stage returning `table`.
    #[must_use]
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

#[async_trait]
impl Stage for ConstStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> Result<Table, StageError> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageInputs;
    use crate::table::Value;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("one", |_ctx| Table::from_columns(vec![("x", vec![Value::Int(1)])]).map_err(|e| StageError::new("one", e.to_string())));

        assert_eq!(stage.name(), "one");

        let ctx = StageContext::detached("one", StageInputs::default());
        let table = stage.execute(&ctx).await.unwrap();
        assert_eq!(table.num_rows(), 1);
    }

    #[tokio::test]
    async fn test_fn_stage_error_names_stage() {
        let stage = FnStage::new("broken", |ctx| Err(ctx.error("no data")));
        let ctx = StageContext::detached("broken", StageInputs::default());

        let err = stage.execute(&ctx).await.unwrap_err();
        assert_eq!(err.stage, "broken");
    }

    #[tokio::test]
    async fn test_const_stage() {
        let table = Table::from_columns(vec![("x", vec![Value::Int(7)])]).unwrap();
        let stage = ConstStage::new("seed", table.clone());

        let ctx = StageContext::detached("seed", StageInputs::default());
        assert_eq!(stage.execute(&ctx).await.unwrap(), table);
    }
}
