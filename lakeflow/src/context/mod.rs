//! Context management for stage execution.
//!
//! This module provides:
//! - the run identity recorded in every commit a run makes
//! - typed run parameters, with secrets masked on output
//! - strict, declared-only access to a stage's input tables

#[cfg(test)]
mod context_tests;
mod execution;
mod identity;
mod inputs;
mod parameters;

pub use execution::StageContext;
pub use identity::RunIdentity;
pub use inputs::StageInputs;
pub use parameters::{ParamValue, Parameters};
