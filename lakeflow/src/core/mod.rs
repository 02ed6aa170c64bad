//! Core enums shared across the crate.

mod status;

pub use status::{ExpectationPolicy, Materialization, StageKind, StageStatus};
