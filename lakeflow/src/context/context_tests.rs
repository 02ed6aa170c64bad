//! Tests for the stage context.

#[cfg(test)]
mod tests {
    use crate::context::{ParamValue, Parameters, RunIdentity, StageContext, StageInputs};
    use crate::table::{Table, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context() -> StageContext {
        let table = Arc::new(Table::from_columns(vec![("n", vec![Value::Int(1), Value::Int(2)])]).unwrap());
        let mut tables = HashMap::new();
        tables.insert("numbers".to_string(), table);
        let inputs = StageInputs::new(tables, ["numbers", "later"], "double");

        let mut parameters = Parameters::new();
        parameters.insert("factor".to_string(), ParamValue::Int(2));
        parameters.insert("token".to_string(), ParamValue::Secret("s3cr3t".to_string()));

        StageContext::new(
            "double",
            inputs,
            Arc::new(parameters),
            Arc::new(RunIdentity::new("p", "ada")),
        )
    }

    #[test]
    fn test_input_present() {
        let ctx = context();
        assert_eq!(ctx.input("numbers").unwrap().num_rows(), 2);
    }

    #[test]
    fn test_input_declared_but_missing() {
        let err = context().input("later").unwrap_err();
        assert_eq!(err.stage, "double");
        assert!(err.message.contains("later"));
    }

    #[test]
    fn test_input_undeclared() {
        let err = context().input("zones").unwrap_err();
        assert!(err.message.contains("Undeclared input"));
    }

    #[test]
    fn test_parameters() {
        let ctx = context();
        assert_eq!(ctx.parameter("factor").and_then(ParamValue::as_i64), Some(2));
        assert!(ctx.parameter("token").is_some_and(ParamValue::is_secret));
        assert!(ctx.parameter("missing").is_none());
        assert!(!format!("{:?}", ctx.parameters()).contains("s3cr3t"));
    }

    #[test]
    fn test_detached_context() {
        let ctx = StageContext::detached("solo", StageInputs::default());
        assert_eq!(ctx.stage_name(), "solo");
        assert_eq!(ctx.identity().author, "local");
        assert_eq!(ctx.error("boom").to_string(), "Stage 'solo' failed: boom");
    }
}
