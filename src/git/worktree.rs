//! The shared working tree and its single checkout gate.
//!
//! The on-disk checkout is one mutable resource. [`WorkingTree::checkout`]
//! hands out a [`Checkout`] lease that holds the gate until it is dropped,
//! so no other checkout (or restore) can move the tree while an analyzer
//! is still reading it.

use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};

use super::{RepositoryError, find_repo_root, git_output, run_git};

/// Owned handle on a repository's working tree.
#[derive(Debug)]
pub struct WorkingTree {
    root: PathBuf,
    /// Commit currently checked out by us, if any.
    head: Mutex<Option<String>>,
}

/// Exclusive lease on the working tree at a specific commit.
#[derive(Debug)]
pub struct Checkout<'a> {
    root: &'a Path,
    head: MutexGuard<'a, Option<String>>,
}

impl Checkout<'_> {
    /// Root of the checked-out tree.
    pub fn path(&self) -> &Path {
        self.root
    }

    /// Full hash of the checked-out commit.
    pub fn commit(&self) -> &str {
        self.head.as_deref().unwrap_or_default()
    }
}

impl WorkingTree {
    /// Open the repository containing `path`.
    pub async fn open(path: &Path) -> Result<Self, RepositoryError> {
        let root = find_repo_root(path).await?;
        Ok(Self {
            root,
            head: Mutex::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make the working tree match `commit` exactly.
    ///
    /// Waits for any outstanding [`Checkout`] lease to be released first.
    /// Fails on unknown commits and on local modifications that would be
    /// overwritten; the tree is never forced.
    pub async fn checkout(&self, commit: &str) -> Result<Checkout<'_>, RepositoryError> {
        let mut head = self.head.lock().await;

        let output = git_output(&self.root, &["checkout", "--quiet", "--detach", commit]).await?;
        if !output.status.success() {
            return Err(RepositoryError::Checkout {
                commit: commit.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // The analyzer reads the filesystem directly, so confirm HEAD moved.
        let actual = run_git(&self.root, &["rev-parse", "HEAD"]).await?;
        if !actual.starts_with(commit) && !commit.starts_with(&actual) {
            return Err(RepositoryError::Checkout {
                commit: commit.to_string(),
                reason: format!("HEAD is at {actual} after checkout"),
            });
        }

        tracing::debug!("checked out {actual}");
        *head = Some(actual);
        Ok(Checkout {
            root: &self.root,
            head,
        })
    }

    /// Discard local changes and untracked files, then switch to `branch`.
    ///
    /// Ignored files are kept. Every step is attempted even if an earlier
    /// one fails; the first failure is returned.
    pub async fn restore(&self, branch: &str) -> Result<(), RepositoryError> {
        let mut head = self.head.lock().await;

        let steps: [&[&str]; 3] = [
            &["reset", "--hard", "--quiet"],
            &["clean", "-fd", "--quiet"],
            &["checkout", "--quiet", branch],
        ];

        let mut first_error = None;
        for args in steps {
            if let Err(e) = run_git(&self.root, args).await {
                tracing::error!("restore step `git {}` failed: {e}", args.join(" "));
                first_error.get_or_insert(e);
            }
        }

        *head = None;
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("repository restored to {branch}");
                Ok(())
            }
        }
    }

    /// Blocking variant of [`restore`](Self::restore) for drop paths where
    /// no async context is available.
    pub(crate) fn restore_blocking(&self, branch: &str) -> Result<(), RepositoryError> {
        let steps: [&[&str]; 3] = [
            &["reset", "--hard", "--quiet"],
            &["clean", "-fd", "--quiet"],
            &["checkout", "--quiet", branch],
        ];
        for args in steps {
            let output = std::process::Command::new("git")
                .args(args)
                .current_dir(&self.root)
                .output()
                .map_err(RepositoryError::Spawn)?;
            super::check_output(&output, args)?;
        }
        Ok(())
    }
}
