//! Name validation.
//!
//! Stage and artifact names double as SQL identifiers, so they are stricter
//! than catalog ref names, which may also contain `.` and `-` (run branches
//! are named `<target>.run_<id>`).

use regex::Regex;
use std::sync::OnceLock;

/// Pattern for stage and artifact names.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Pattern for branch, tag and table names in the catalog.
pub const REF_NAME_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$";

static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
static REF_NAME: OnceLock<Option<Regex>> = OnceLock::new();

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Returns true if `name` can name a stage or an artifact.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    matches(&IDENTIFIER, IDENTIFIER_PATTERN, name)
}

/// Returns true if `name` can name a branch, tag or catalog table.
#[must_use]
pub fn is_valid_ref_name(name: &str) -> bool {
    !name.ends_with('.') && !name.contains("..") && matches(&REF_NAME, REF_NAME_PATTERN, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("hourly_counts"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_ref_names() {
        assert!(is_valid_ref_name("main"));
        assert!(is_valid_ref_name("main.run_1a2b3c4d"));
        assert!(is_valid_ref_name("v1-0"));
        assert!(!is_valid_ref_name("-dash"));
        assert!(!is_valid_ref_name("a..b"));
        assert!(!is_valid_ref_name("a b"));
        assert!(!is_valid_ref_name("@abc"));
    }
}
