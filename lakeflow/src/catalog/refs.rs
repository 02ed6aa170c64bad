//! Reference parsing.
//!
//! A reference is a branch name, a tag name, or `@` followed by a commit id
//! or a unique prefix of one.

/// Minimum length of a commit id prefix.
pub const MIN_COMMIT_PREFIX: usize = 4;

/// A parsed reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSpec<'a> {
    /// A branch or tag name.
    Name(&'a str),
    /// A commit id or id prefix.
    Commit(&'a str),
}

impl<'a> RefSpec<'a> {
    /// Parses a reference string.
    #[must_use]
    pub fn parse(reference: &'a str) -> Self {
        match reference.strip_prefix('@') {
            Some(id) => Self::Commit(id),
            None => Self::Name(reference),
        }
    }
}

/// Returns true if `prefix` can select a commit.
pub(crate) fn is_commit_prefix(prefix: &str) -> bool {
    prefix.len() >= MIN_COMMIT_PREFIX && prefix.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(RefSpec::parse("main"), RefSpec::Name("main"));
        assert_eq!(RefSpec::parse("@ab12cd"), RefSpec::Commit("ab12cd"));
        assert!(is_commit_prefix("ab12"));
        assert!(!is_commit_prefix("ab1"));
        assert!(!is_commit_prefix("xyz123"));
    }
}
