//! Issue lists: fetched from the tracker, saved, and loaded back as input
//! for the commit matcher.

pub mod jira;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Issue, IssueKey};

pub use jira::JiraClient;

/// Errors from the issue tracker and issue files.
#[derive(Error, Debug)]
pub enum IssueError {
    #[error("issue tracker request failed: {0}")]
    Http(String),

    #[error("issue tracker returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to parse issue tracker response: {0}")]
    Parse(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid issue list {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Accepted shapes of an issue file.
#[derive(Deserialize)]
#[serde(untagged)]
enum IssueFile {
    Search { issues: Vec<Issue> },
    Bare(Vec<Issue>),
}

#[derive(Serialize)]
struct SavedIssues<'a> {
    total: usize,
    issues: &'a [Issue],
}

/// Load issues from a tracker search response (`{"issues": [...]}`) or a
/// bare JSON array of issues.
pub fn load_issues(path: &Path) -> Result<Vec<Issue>, IssueError> {
    let content = std::fs::read_to_string(path).map_err(|source| IssueError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: IssueFile = serde_json::from_str(&content).map_err(|source| IssueError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let issues = match file {
        IssueFile::Search { issues } | IssueFile::Bare(issues) => issues,
    };
    tracing::info!("loaded {} issue(s) from {}", issues.len(), path.display());
    Ok(issues)
}

/// Save issues in the tracker's search-response shape.
pub fn save_issues(path: &Path, issues: &[Issue]) -> Result<(), IssueError> {
    let io_error = |source| IssueError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let body = serde_json::to_string_pretty(&SavedIssues {
        total: issues.len(),
        issues,
    })
    .map_err(|source| IssueError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, body).map_err(io_error)
}

/// The keys of `issues`, in order.
pub fn issue_keys(issues: &[Issue]) -> Vec<IssueKey> {
    issues.iter().map(|i| i.key.clone()).collect()
}
