//! Stages built from declarative table operations.

use super::Stage;
use crate::context::StageContext;
use crate::errors::StageError;
use crate::table::{Table, TableOp};
use async_trait::async_trait;

/// Applies a list of [`TableOp`]s, in order, to one source input.
///
/// Operations that read other tables (joins) resolve them through the
/// stage's declared inputs, so every such table must be declared too; see
/// [`OpsStage::inputs`].
#[derive(Debug, Clone)]
pub struct OpsStage {
    name: String,
    source: String,
    ops: Vec<TableOp>,
}

impl OpsStage {
    /// Creates a stage reading `source`.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>, ops: Vec<TableOp>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ops,
        }
    }

    /// All inputs the stage reads: the source, then any join inputs.
    #[must_use]
    pub fn inputs(&self) -> Vec<String> {
        let mut inputs = vec![self.source.clone()];
        for op in &self.ops {
            for extra in op.extra_inputs() {
                if !inputs.iter().any(|i| i == extra) {
                    inputs.push(extra.to_string());
                }
            }
        }
        inputs
    }

    /// The operations, in application order.
    #[must_use]
    pub fn ops(&self) -> &[TableOp] {
        &self.ops
    }
}

#[async_trait]
impl Stage for OpsStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<Table, StageError> {
        let source = ctx.input(&self.source)?;
        let lookup = |name: &str| ctx.inputs().get(name).ok().flatten();

        let mut current = (*source).clone();
        for (step, op) in self.ops.iter().enumerate() {
            current = op
                .apply(&current, &lookup, ctx.parameters())
                .map_err(|e| ctx.error(format!("operation {} failed: {e}", step + 1)))?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageInputs;
    use crate::table::{CompareOp, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx(stage: &OpsStage, tables: Vec<(&str, Table)>) -> StageContext {
        let tables: HashMap<String, Arc<Table>> = tables
            .into_iter()
            .map(|(name, t)| (name.to_string(), Arc::new(t)))
            .collect();
        StageContext::detached(stage.name(), StageInputs::new(tables, stage.inputs(), stage.name()))
    }

    #[tokio::test]
    async fn test_ops_in_order() {
        let stage = OpsStage::new(
            "big",
            "numbers",
            vec![
                TableOp::DropNulls { columns: vec![] },
                TableOp::Filter {
                    column: "n".into(),
                    cmp: CompareOp::Gt,
                    value: serde_json::json!(1),
                },
            ],
        );
        let numbers = Table::from_columns(vec![(
            "n",
            vec![Value::Int(1), Value::Null, Value::Int(5), Value::Int(3)],
        )])
        .unwrap();

        let out = stage.execute(&ctx(&stage, vec![("numbers", numbers)])).await.unwrap();
        assert_eq!(out.num_rows(), 2);
        assert!(!out.schema().column("n").unwrap().nullable);
    }

    #[tokio::test]
    async fn test_join_input_declared() {
        let stage = OpsStage::new(
            "enriched",
            "trips",
            vec![TableOp::Join {
                right: "zones".into(),
                left_on: "zone_id".into(),
                right_on: "id".into(),
            }],
        );
        assert_eq!(stage.inputs(), vec!["trips".to_string(), "zones".to_string()]);

        let trips = Table::from_columns(vec![("zone_id", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        let zones = Table::from_columns(vec![
            ("id", vec![Value::Int(1)]),
            ("borough", vec![Value::from("Queens")]),
        ])
        .unwrap();

        let out = stage
            .execute(&ctx(&stage, vec![("trips", trips), ("zones", zones)]))
            .await
            .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.value(0, "borough"), Some(&Value::from("Queens")));
    }

    #[tokio::test]
    async fn test_failure_names_step() {
        let stage = OpsStage::new("bad", "numbers", vec![TableOp::Select { columns: vec!["nope".into()] }]);
        let numbers = Table::from_columns(vec![("n", vec![Value::Int(1)])]).unwrap();

        let err = stage.execute(&ctx(&stage, vec![("numbers", numbers)])).await.unwrap_err();
        assert_eq!(err.stage, "bad");
        assert!(err.message.contains("operation 1"));
    }
}
