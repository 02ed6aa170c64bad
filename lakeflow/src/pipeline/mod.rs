//! Pipeline building and execution.
//!
//! This module provides:
//! - stage declarations and the registration builder
//! - graph resolution: internal edges, external inputs, cycle detection
//! - the concurrent DAG execution engine

mod builder;
mod dag;
mod spec;

pub use builder::{PipelineBuilder, StageRegistration};
pub use dag::{ExpectationResult, GraphExecutionResult, StageGraph, StageResult};
pub use spec::StageSpec;
