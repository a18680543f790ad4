//! Issue-tracker records and their commit associations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque issue identifier such as `HIVE-12345`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IssueKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Result of looking up one issue key in commit history.
///
/// `commit == None` is the "not found" outcome; it is a normal result,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMatch {
    pub key: IssueKey,
    pub commit: Option<String>,
    /// Paths changed by the matched commit, relative to the repository root.
    pub files: Vec<String>,
}

impl CommitMatch {
    pub fn found(key: IssueKey, commit: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            key,
            commit: Some(commit.into()),
            files,
        }
    }

    pub fn not_found(key: IssueKey) -> Self {
        Self {
            key,
            commit: None,
            files: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.commit.is_some()
    }
}

/// An issue as returned by the tracker's search endpoint.
///
/// Serializes back to the tracker's own JSON shape, so a saved issue list
/// can be fed to `relmine match` unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawIssue", into = "RawIssue")]
pub struct Issue {
    pub id: String,
    pub key: IssueKey,
    pub summary: Option<String>,
    pub fix_versions: Vec<String>,
    pub affected_versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawIssue {
    #[serde(default)]
    id: String,
    key: IssueKey,
    #[serde(default)]
    fields: RawFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    fix_versions: Vec<RawVersion>,
    #[serde(default, deserialize_with = "null_as_empty")]
    versions: Vec<RawVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawVersion {
    name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RawVersion>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<RawVersion>>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        let names = |versions: Vec<RawVersion>| versions.into_iter().map(|v| v.name).collect();
        Self {
            id: raw.id,
            key: raw.key,
            summary: raw.fields.summary,
            fix_versions: names(raw.fields.fix_versions),
            affected_versions: names(raw.fields.versions),
        }
    }
}

impl From<Issue> for RawIssue {
    fn from(issue: Issue) -> Self {
        let raw = |names: Vec<String>| names.into_iter().map(|name| RawVersion { name }).collect();
        Self {
            id: issue.id,
            key: issue.key,
            fields: RawFields {
                summary: issue.summary,
                fix_versions: raw(issue.fix_versions),
                versions: raw(issue.affected_versions),
            },
        }
    }
}
