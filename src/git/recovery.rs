//! Restores the working tree after a run, however the run ended.

use super::{RepositoryError, WorkingTree};

/// Scoped restore action for a [`WorkingTree`].
///
/// Call [`restore`](Self::restore) on every normal exit path, including
/// errors and interruption. If the guard is dropped without that call
/// (a panic unwinding through the pipeline), the restore runs
/// synchronously from `Drop`.
#[derive(Debug)]
pub struct RecoveryGuard<'a> {
    tree: &'a WorkingTree,
    branch: String,
    armed: bool,
}

impl<'a> RecoveryGuard<'a> {
    pub fn new(tree: &'a WorkingTree, branch: impl Into<String>) -> Self {
        Self {
            tree,
            branch: branch.into(),
            armed: true,
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Reset, clean, and check out the primary branch. Runs once.
    pub async fn restore(mut self) -> Result<(), RepositoryError> {
        self.armed = false;
        self.tree.restore(&self.branch).await
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(
            "run ended without an orderly restore; restoring {} to {}",
            self.tree.root().display(),
            self.branch
        );
        if let Err(e) = self.tree.restore_blocking(&self.branch) {
            tracing::error!("failed to restore repository: {e}");
        }
    }
}
