//! Transactional pipeline runs against a [`Catalog`](crate::catalog::Catalog).
//!
//! A run forks a private branch from its target, executes the stage graph
//! there, commits every persisted output to that branch and, once every
//! stage and asserted expectation has passed, merges the branch back in a
//! single atomic step. A failed run never touches the target.

mod driver;
mod options;
mod state;

pub use driver::{PipelineRunner, STAGE_PROPERTY};
pub use options::{RunOptions, DEFAULT_AUTHOR};
pub use state::{RunState, RunStatus};
