//! Git CLI wrapper.
//!
//! Shells out to `git` via `tokio::process::Command`. Every operation
//! takes the repository root explicitly; nothing depends on the process
//! working directory.

pub mod history;
pub mod recovery;
pub mod tags;
pub mod worktree;

use std::path::{Path, PathBuf};
use std::process::Output;

use thiserror::Error;

pub use recovery::RecoveryGuard;
pub use worktree::{Checkout, WorkingTree};

/// Errors from repository operations.
///
/// All variants are fatal for a metrics run: a half-applied checkout
/// would silently corrupt downstream metrics.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("git {command} failed (exit {status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("checkout of {commit} failed: {reason}")]
    Checkout { commit: String, reason: String },

    #[error("unexpected git output: {0}")]
    InvalidOutput(String),

    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run `git <args>` inside `repo` and return its raw output, whatever the
/// exit status.
pub(crate) async fn git_output(repo: &Path, args: &[&str]) -> Result<Output, RepositoryError> {
    tracing::debug!("git {}", args.join(" "));
    tokio::process::Command::new("git")
        .args(args)
        .current_dir(repo)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(RepositoryError::Spawn)
}

/// Run `git <args>` inside `repo` and return trimmed stdout, failing on a
/// non-zero exit.
pub(crate) async fn run_git(repo: &Path, args: &[&str]) -> Result<String, RepositoryError> {
    let output = git_output(repo, args).await?;
    check_output(&output, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub(crate) fn check_output(output: &Output, args: &[&str]) -> Result<(), RepositoryError> {
    if output.status.success() {
        return Ok(());
    }
    Err(RepositoryError::Command {
        command: args.first().copied().unwrap_or_default().to_string(),
        status: output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string()),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Resolve `dir` as the root of a git repository.
///
/// `dir` must be the top level of the work tree itself. A directory that
/// merely sits inside some other repository is rejected, so restores never
/// reach an enclosing checkout.
pub async fn find_repo_root(dir: &Path) -> Result<PathBuf, RepositoryError> {
    let not_a_repo = || RepositoryError::NotARepository(dir.to_path_buf());
    if !dir.is_dir() {
        return Err(not_a_repo());
    }
    let output = git_output(dir, &["rev-parse", "--show-toplevel"]).await?;
    if !output.status.success() {
        return Err(not_a_repo());
    }
    let root = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());

    let canonical = |path: &Path| {
        path.canonicalize().map_err(|source| RepositoryError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    if canonical(&root)? != canonical(dir)? {
        tracing::debug!("{} is inside {}, not a repository root", dir.display(), root.display());
        return Err(not_a_repo());
    }
    Ok(root)
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

/// Make sure a clone exists at `path`, cloning from `url` when it does not.
///
/// An existing repository is opened as-is; it is never re-cloned. An
/// existing empty directory is cloned into.
pub async fn ensure_repo(path: &Path, url: Option<&str>) -> Result<PathBuf, RepositoryError> {
    if path.exists() && !(url.is_some() && is_empty_dir(path)) {
        return find_repo_root(path).await;
    }
    let Some(url) = url else {
        return Err(RepositoryError::NotARepository(path.to_path_buf()));
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RepositoryError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    tracing::info!("cloning {url} into {}", path.display());
    let target = path.to_string_lossy();
    let cwd = std::env::current_dir().map_err(|source| RepositoryError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    run_git(&cwd, &["clone", "--quiet", url, &target]).await?;
    tracing::info!("clone finished");
    find_repo_root(path).await
}

/// Whether `refs/heads/<branch>` exists.
pub async fn branch_exists(repo: &Path, branch: &str) -> Result<bool, RepositoryError> {
    let refname = format!("refs/heads/{branch}");
    let output = git_output(repo, &["rev-parse", "--verify", "--quiet", &refname]).await?;
    Ok(output.status.success())
}

/// Pick the branch the repository is restored to after a run.
///
/// A configured branch wins; otherwise `main` when it exists, else `master`.
pub async fn primary_branch(
    repo: &Path,
    configured: Option<&str>,
) -> Result<String, RepositoryError> {
    if let Some(branch) = configured {
        return Ok(branch.to_string());
    }
    if branch_exists(repo, "main").await? {
        Ok("main".to_string())
    } else {
        Ok("master".to_string())
    }
}
