//! # Lakeflow
//!
//! Named-stage table pipelines over a branching, versioned catalog.
//!
//! Lakeflow provides:
//!
//! - **Stage graphs**: stages declare named inputs and one named output; the
//!   builder wires them into a validated DAG
//! - **A versioned catalog**: branches, tags and content-addressed tables,
//!   with time travel to any commit
//! - **Transactional runs**: every run writes to a private branch and is
//!   promoted to its target in one atomic step
//! - **Expectations**: data-quality checks that abort or warn
//! - **SQL and declarative stages** loaded from a project directory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lakeflow::prelude::*;
//!
//! let mut builder = PipelineBuilder::new("quick-start");
//! builder
//!     .register("clean")
//!     .input("raw_events")
//!     .persist()
//!     .runner(Arc::new(OpsStage::new("clean", "raw_events", ops)))
//!     .done()?;
//! let graph = builder.build()?;
//!
//! let catalog = Arc::new(MemoryCatalog::new());
//! let state = PipelineRunner::new(catalog).run(&graph, &RunOptions::new()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod catalog;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod expectations;
pub mod pipeline;
pub mod project;
pub mod runner;
pub mod sql;
pub mod stages;
pub mod table;
pub mod utils;
pub mod view;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogError, CommitFilter, CommitMeta, MemoryCatalog, MAIN_BRANCH};
    pub use crate::context::{ParamValue, Parameters, RunIdentity, StageContext, StageInputs};
    pub use crate::core::{ExpectationPolicy, Materialization, StageKind, StageStatus};
    pub use crate::errors::{
        ContractErrorInfo, CycleDetectedError, LakeflowError, PipelineValidationError, StageError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::expectations::{Check, ExpectationStage};
    pub use crate::pipeline::{PipelineBuilder, StageGraph, StageSpec};
    pub use crate::project::ProjectDescriptor;
    pub use crate::runner::{PipelineRunner, RunOptions, RunState, RunStatus};
    pub use crate::sql::SqlStage;
    pub use crate::stages::{ConstStage, FnStage, OpsStage, Stage};
    pub use crate::table::{Table, TableOp, Value};
    pub use crate::view::{ArtifactViewer, Lookup};
    pub use std::sync::Arc;
}
