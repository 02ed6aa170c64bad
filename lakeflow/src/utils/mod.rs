//! Small helpers shared by the catalog, the pipeline builder and the runner.

mod uuid_utils;
mod validation;

pub use uuid_utils::{generate_job_id, run_branch_name, short_id};
pub use validation::{is_valid_identifier, is_valid_ref_name, IDENTIFIER_PATTERN, REF_NAME_PATTERN};
