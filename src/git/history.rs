//! Commit-history scanning.
//!
//! Each call spawns its own `git log` process, so concurrent scans never
//! share a handle and never touch the working tree.

use std::path::Path;
use std::process::Stdio;

use indexmap::IndexSet;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{RepositoryError, run_git};

const FIELD_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;

/// Walk history from `HEAD` in `git log` order and return the hash of the
/// first commit whose full message satisfies `matches`.
///
/// Stops reading (and kills `git log`) as soon as a commit matches.
pub async fn find_first_commit<F>(repo: &Path, matches: F) -> Result<Option<String>, RepositoryError>
where
    F: Fn(&str) -> bool,
{
    let mut child = tokio::process::Command::new("git")
        .args(["log", "--format=%H%x1f%B%x1e"])
        .current_dir(repo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RepositoryError::Spawn)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RepositoryError::InvalidOutput("git log has no stdout".to_string()))?;
    let mut reader = BufReader::new(stdout);
    let mut record = Vec::new();

    loop {
        record.clear();
        let read = reader
            .read_until(RECORD_SEP, &mut record)
            .await
            .map_err(|source| RepositoryError::Io {
                path: repo.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        if let Some((hash, message)) = split_record(&record) {
            if matches(&message) {
                return Ok(Some(hash));
            }
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(RepositoryError::Spawn)?;
    super::check_output(&output, &["log"])?;
    Ok(None)
}

/// Split one `hash \x1f message \x1e` record. Records after the first
/// start with the newline `git log` puts between entries.
fn split_record(record: &[u8]) -> Option<(String, String)> {
    let record = record.strip_suffix(&[RECORD_SEP]).unwrap_or(record);
    let sep = record.iter().position(|&b| b == FIELD_SEP)?;
    let hash = String::from_utf8_lossy(&record[..sep]).trim().to_string();
    if hash.is_empty() {
        return None;
    }
    let message = String::from_utf8_lossy(&record[sep + 1..]).into_owned();
    Some((hash, message))
}

/// Paths touched by `commit`, relative to the repository root.
///
/// Merge commits report the union of their diffs against every parent.
pub async fn changed_files(repo: &Path, commit: &str) -> Result<Vec<String>, RepositoryError> {
    let stdout = run_git(
        repo,
        &[
            "diff-tree",
            "--no-commit-id",
            "--name-only",
            "-r",
            "--root",
            "-m",
            commit,
        ],
    )
    .await?;

    let files: IndexSet<&str> = stdout.lines().filter(|l| !l.is_empty()).collect();
    Ok(files.into_iter().map(str::to_string).collect())
}
