//! The version-ordered metrics pipeline.
//!
//! Versions are processed strictly one after another: cache lookup, then
//! checkout, analyze, store and append. The working tree is a single
//! shared resource, so nothing here runs concurrently.
//!
//! [`MetricsPipeline::run`] wraps the loop in a [`RecoveryGuard`] and races
//! it against a shutdown signal; whichever way the loop ends, the
//! repository is put back on its primary branch.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use thiserror::Error;

use crate::analyzer::{self, AnalyzerError, MetricsAnalyzer};
use crate::cache::MetricsCache;
use crate::git::{RecoveryGuard, RepositoryError, WorkingTree};
use crate::models::{MetricSet, VersionCommit};
use crate::output::{MetricsTable, OutputError};
use crate::progress::{ProgressTracker, StepStatus};

/// Errors that abort a metrics run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("interrupted after {completed} version(s)")]
    Interrupted { completed: usize },

    /// The run itself succeeded but the repository could not be restored.
    #[error("failed to restore repository: {0}")]
    Recovery(#[source] RepositoryError),
}

/// What a run did, per version.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Versions analyzed in this run.
    pub computed: usize,
    /// Versions served from the cache.
    pub cached: usize,
    /// Versions skipped after a recoverable analyzer failure.
    pub failed: Vec<Version>,
    /// Rows appended to the output table.
    pub rows: usize,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.computed + self.cached + self.failed.len()
    }
}

pub struct MetricsPipeline {
    tree: WorkingTree,
    cache: MetricsCache,
    analyzer: Arc<dyn MetricsAnalyzer>,
    metrics: MetricSet,
    work_dir: PathBuf,
}

impl MetricsPipeline {
    pub fn new(
        tree: WorkingTree,
        cache: MetricsCache,
        analyzer: Arc<dyn MetricsAnalyzer>,
        metrics: MetricSet,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tree,
            cache,
            analyzer,
            metrics,
            work_dir: work_dir.into(),
        }
    }

    pub fn tree(&self) -> &WorkingTree {
        &self.tree
    }

    /// Run over `versions`, writing the table to `output`, and restore the
    /// repository to `branch` afterwards.
    ///
    /// When `shutdown` resolves first, the in-flight version is abandoned
    /// (its analyzer process is killed), rows already appended stay in the
    /// table, and [`PipelineError::Interrupted`] is returned after the
    /// restore. A restore failure never replaces an earlier error.
    pub async fn run<F>(
        &self,
        versions: &[VersionCommit],
        output: &Path,
        branch: &str,
        progress: &ProgressTracker,
        shutdown: F,
    ) -> Result<RunSummary, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let mut table = MetricsTable::create(output, &self.metrics)?;
        let mut summary = RunSummary::default();
        let guard = RecoveryGuard::new(&self.tree, branch);

        progress.start();
        let outcome = tokio::select! {
            result = self.process(versions, &mut table, progress, &mut summary) => result.map(|()| true),
            () = shutdown => Ok(false),
        };
        progress.finish();

        let outcome = match outcome {
            Ok(true) => Ok(()),
            Ok(false) => {
                let completed = summary.completed();
                tracing::warn!("interrupt received; stopping after {completed} version(s)");
                Err(PipelineError::Interrupted { completed })
            }
            Err(e) => Err(e),
        };

        let restored = guard.restore().await;
        match (outcome, restored) {
            (Ok(()), Ok(())) => {
                tracing::info!(
                    "metrics run finished: {} computed, {} cached, {} failed, {} row(s) in {}",
                    summary.computed,
                    summary.cached,
                    summary.failed.len(),
                    summary.rows,
                    table.path().display()
                );
                Ok(summary)
            }
            (Ok(()), Err(e)) => Err(PipelineError::Recovery(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore)) => {
                tracing::error!("repository restore also failed: {restore}");
                Err(e)
            }
        }
    }

    /// Process versions in order, appending to `table`. Does not restore
    /// the repository; use [`run`](Self::run) for that.
    pub async fn process(
        &self,
        versions: &[VersionCommit],
        table: &mut MetricsTable,
        progress: &ProgressTracker,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        for release in versions {
            self.process_version(release, table, progress, summary).await?;
        }
        Ok(())
    }

    async fn process_version(
        &self,
        release: &VersionCommit,
        table: &mut MetricsTable,
        progress: &ProgressTracker,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let label = release.version.to_string();

        if let Some(entry) = self.cache.lookup(release) {
            match self.cache.load(&entry, &self.metrics) {
                Ok(rows) => {
                    tracing::debug!("{release}: cache hit at {}", entry.path.display());
                    let rows = table.append(release, &rows)?;
                    summary.cached += 1;
                    summary.rows += rows;
                    progress.update(&label, StepStatus::Cached { rows });
                    return Ok(());
                }
                Err(e) => tracing::warn!("{release}: unreadable cache entry, recomputing: {e}"),
            }
        } else {
            tracing::debug!("{release}: cache miss");
        }

        progress.update(&label, StepStatus::CheckingOut);
        let checkout = self.tree.checkout(&release.commit).await?;

        progress.update(&label, StepStatus::Analyzing);
        let extracted = analyzer::extract(
            self.analyzer.as_ref(),
            &checkout,
            &release.version,
            &self.metrics,
            &self.work_dir,
        )
        .await;
        drop(checkout);

        let rows = match extracted {
            Ok(rows) => rows,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::error!("{release}: analysis failed, skipping version: {e}");
                summary.failed.push(release.version.clone());
                progress.update(&label, StepStatus::Failed(e.to_string()));
                return Ok(());
            }
        };

        if let Err(e) = self.cache.store(release, &self.metrics, &rows) {
            tracing::warn!("{release}: failed to cache metrics: {e}");
        }
        let rows = table.append(release, &rows)?;
        summary.computed += 1;
        summary.rows += rows;
        progress.update(&label, StepStatus::Done { rows });
        Ok(())
    }
}
