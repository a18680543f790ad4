//! Release versions resolved from repository tags.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;

/// A release version and the commit its tag points at.
///
/// Ordered by semantic version only; the tag name and commit do not take
/// part in the comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCommit {
    pub version: Version,
    /// Tag name the version was parsed from (e.g. `rel/release-2.0.0`).
    pub tag: String,
    /// Full hash of the tag's target commit.
    pub commit: String,
}

impl VersionCommit {
    pub fn new(version: Version, tag: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            version,
            tag: tag.into(),
            commit: commit.into(),
        }
    }

    /// First `len` characters of the commit hash.
    pub fn short_commit(&self, len: usize) -> &str {
        let end = self
            .commit
            .char_indices()
            .nth(len)
            .map_or(self.commit.len(), |(i, _)| i);
        &self.commit[..end]
    }
}

impl PartialOrd for VersionCommit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionCommit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for VersionCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.short_commit(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_numerically() {
        let a = VersionCommit::new(Version::new(9, 0, 0), "release-9.0.0", "aaa");
        let b = VersionCommit::new(Version::new(10, 0, 0), "release-10.0.0", "bbb");
        assert!(a < b);
    }

    #[test]
    fn short_commit_truncates() {
        let v = VersionCommit::new(Version::new(1, 2, 3), "release-1.2.3", "0123456789abcdef");
        assert_eq!(v.short_commit(7), "0123456");
        assert_eq!(v.short_commit(64), "0123456789abcdef");
        assert_eq!(v.to_string(), "1.2.3 (0123456789)");
    }
}
