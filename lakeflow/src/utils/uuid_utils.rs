//! Job ids and the names derived from them.

use uuid::Uuid;

/// Generates a new job id.
///
/// Ids are v7 so that they sort by creation time.
#[must_use]
pub fn generate_job_id() -> Uuid {
    Uuid::now_v7()
}

/// The last eight hex digits of an id, used in branch names and log lines.
///
/// The leading digits of a v7 id are a timestamp, so runs started close
/// together would share them; the tail is random.
#[must_use]
pub fn short_id(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    hex[hex.len() - 8..].to_string()
}

/// Name of the branch a run writes to before promotion.
#[must_use]
pub fn run_branch_name(target: &str, job_id: &Uuid) -> String {
    format!("{target}.run_{}", short_id(job_id))
}
