//! Version resolution: release tags to an ordered list of
//! (version, commit) pairs.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use regex::Regex;
use semver::Version;
use thiserror::Error;

use crate::git::RepositoryError;
use crate::git::tags::{TagRef, list_tags};
use crate::models::VersionCommit;

/// Errors from version resolution.
#[derive(Error, Debug)]
pub enum VersionError {
    #[error("invalid tag pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("tag pattern must define named groups `major`, `minor` and `patch`")]
    MissingGroups,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Release-tag naming convention.
#[derive(Debug, Clone)]
pub struct TagPattern {
    regex: Regex,
}

impl TagPattern {
    /// Compile a pattern. It must capture `major`, `minor` and `patch`.
    pub fn new(pattern: &str) -> Result<Self, VersionError> {
        let regex = Regex::new(pattern)?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if !["major", "minor", "patch"].iter().all(|g| names.contains(g)) {
            return Err(VersionError::MissingGroups);
        }
        Ok(Self { regex })
    }

    /// Parse the version out of a tag name, if the tag follows the convention.
    pub fn parse(&self, tag: &str) -> Option<Version> {
        let caps = self.regex.captures(tag)?;
        let part = |name: &str| caps.name(name)?.as_str().parse::<u64>().ok();
        Some(Version::new(part("major")?, part("minor")?, part("patch")?))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Turn tags into (version, commit) pairs sorted ascending by version.
///
/// Tags that do not follow the pattern are skipped. When several tags
/// resolve to the same version the first one encountered wins and the
/// collision is logged.
pub fn resolve_versions(tags: &[TagRef], pattern: &TagPattern) -> Vec<VersionCommit> {
    let mut by_version: BTreeMap<Version, VersionCommit> = BTreeMap::new();

    for tag in tags {
        let Some(version) = pattern.parse(&tag.name) else {
            tracing::trace!("skipping tag {}", tag.name);
            continue;
        };
        match by_version.entry(version) {
            Entry::Vacant(slot) => {
                let version = slot.key().clone();
                slot.insert(VersionCommit::new(version, &tag.name, &tag.commit));
            }
            Entry::Occupied(kept) => {
                tracing::warn!(
                    "tag {} resolves to version {} already claimed by {}; ignoring it",
                    tag.name,
                    kept.key(),
                    kept.get().tag,
                );
            }
        }
    }

    by_version.into_values().collect()
}

/// List the repository's tags and resolve them.
pub async fn resolve(repo: &Path, pattern: &TagPattern) -> Result<Vec<VersionCommit>, VersionError> {
    let tags = list_tags(repo).await?;
    let versions = resolve_versions(&tags, pattern);
    tracing::info!(
        "resolved {} release version(s) from {} tag(s)",
        versions.len(),
        tags.len()
    );
    Ok(versions)
}
