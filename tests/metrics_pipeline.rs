//! End-to-end metrics runs against a real git repository.
//!
//! The analyzer is an in-process fake that reads the checked-out tree,
//! so these tests exercise tag resolution, checkout, caching, table
//! output, interruption and restore without an external tool.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use relmine::analyzer::{AnalysisOutput, AnalysisRequest, AnalyzerError, CommandAnalyzer, MetricsAnalyzer};
use relmine::cache::{CacheKeying, MetricsCache};
use relmine::git::WorkingTree;
use relmine::models::{MetricSet, VersionCommit};
use relmine::pipeline::{MetricsPipeline, PipelineError};
use relmine::progress::ProgressTracker;
use relmine::versions::{self, TagPattern};

use common::{current_branch, tagged_repo};

const VERSIONS: [&str; 5] = ["1.0.0", "1.1.0", "1.2.0", "2.0.0", "2.1.0"];

/// Reports the `v = N` value of `src/Main.java` as its only metric.
///
/// Stalls forever on call `stall_on` (1-based) after notifying `stalled`,
/// and fails with an execution error for `fail_on`.
struct TreeReadingAnalyzer {
    calls: AtomicUsize,
    stall_on: Option<usize>,
    stalled: Arc<Notify>,
    fail_on: Option<semver::Version>,
}

impl TreeReadingAnalyzer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            stall_on: None,
            stalled: Arc::new(Notify::new()),
            fail_on: None,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsAnalyzer for TreeReadingAnalyzer {
    fn name(&self) -> &str {
        "tree-reader"
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisOutput, AnalyzerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stall_on == Some(call) {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        if self.fail_on.as_ref() == Some(request.version) {
            return Err(AnalyzerError::Execution {
                program: "tree-reader".into(),
                status: "exit status: 2".into(),
                stderr: "parse error".into(),
            });
        }

        let source = std::fs::read_to_string(request.tree.join("src/Main.java")).unwrap();
        let value = source
            .split("v = ")
            .nth(1)
            .and_then(|rest| rest.split(';').next())
            .unwrap()
            .to_string();

        let table = request.table_path();
        let db = request.work_dir.join("project.db");
        std::fs::write(&table, format!("File,CountLine\nsrc/Main.java,{value}\n")).unwrap();
        std::fs::write(&db, "scratch").unwrap();
        Ok(AnalysisOutput {
            table,
            artifacts: vec![db],
        })
    }
}

async fn resolve(repo: &Path) -> Vec<VersionCommit> {
    let pattern = TagPattern::new(relmine::constants::DEFAULT_TAG_PATTERN).unwrap();
    versions::resolve(repo, &pattern).await.unwrap()
}

async fn pipeline(repo: &Path, data: &Path, analyzer: Arc<dyn MetricsAnalyzer>, cache: bool) -> MetricsPipeline {
    MetricsPipeline::new(
        WorkingTree::open(repo).await.unwrap(),
        MetricsCache::new(data, CacheKeying::Version, cache),
        analyzer,
        MetricSet::new(["CountLine"]),
        data.join("work"),
    )
}

fn table_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn every_version_is_analyzed_at_its_own_commit() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS);
    let versions = resolve(repo.path()).await;
    assert_eq!(versions.len(), 5);

    let analyzer = Arc::new(TreeReadingAnalyzer::new());
    let pipeline = pipeline(repo.path(), data.path(), analyzer.clone(), true).await;
    let output = data.path().join("metrics.csv");

    let summary = pipeline
        .run(&versions, &output, "main", &ProgressTracker::hidden(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.computed, 5);
    assert_eq!(summary.rows, 5);
    let expected: Vec<String> = std::iter::once("Version,CommitId,File,CountLine".to_string())
        .chain(
            versions
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{},{},src/Main.java,{i}", v.version, v.commit)),
        )
        .collect();
    assert_eq!(table_rows(&output), expected);
    assert_eq!(current_branch(repo.path()), "main");

    // Scratch space is cleaned up after each version.
    let leftovers = std::fs::read_dir(data.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS);
    let versions = resolve(repo.path()).await;

    let analyzer = Arc::new(TreeReadingAnalyzer::new());
    let pipeline = pipeline(repo.path(), data.path(), analyzer.clone(), true).await;
    let output = data.path().join("metrics.csv");

    pipeline
        .run(&versions, &output, "main", &ProgressTracker::hidden(), std::future::pending())
        .await
        .unwrap();
    let first = std::fs::read_to_string(&output).unwrap();

    let summary = pipeline
        .run(&versions, &output, "main", &ProgressTracker::hidden(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(analyzer.calls(), 5);
    assert_eq!(summary.cached, 5);
    assert_eq!(summary.computed, 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), first);
}

#[tokio::test]
async fn disabled_cache_recomputes() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS[..2]);
    let versions = resolve(repo.path()).await;

    let analyzer = Arc::new(TreeReadingAnalyzer::new());
    let pipeline = pipeline(repo.path(), data.path(), analyzer.clone(), false).await;
    let output = data.path().join("metrics.csv");

    for _ in 0..2 {
        pipeline
            .run(&versions, &output, "main", &ProgressTracker::hidden(), std::future::pending())
            .await
            .unwrap();
    }

    assert_eq!(analyzer.calls(), 4);
    assert!(!data.path().join("metrics").exists());
}

#[tokio::test]
async fn interrupt_keeps_completed_versions_and_restores() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS);
    let versions = resolve(repo.path()).await;

    let analyzer = Arc::new(TreeReadingAnalyzer {
        stall_on: Some(3),
        ..TreeReadingAnalyzer::new()
    });
    let stalled = analyzer.stalled.clone();
    let pipeline = pipeline(repo.path(), data.path(), analyzer.clone(), true).await;
    let output = data.path().join("metrics.csv");

    let err = pipeline
        .run(&versions, &output, "main", &ProgressTracker::hidden(), async move {
            stalled.notified().await;
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Interrupted { completed: 2 }));
    let rows = table_rows(&output);
    assert_eq!(rows.len(), 3, "header plus two versions: {rows:?}");
    assert!(rows[1].starts_with("1.0.0,"));
    assert!(rows[2].starts_with("1.1.0,"));
    assert_eq!(current_branch(repo.path()), "main");
}

#[tokio::test]
async fn failed_version_is_skipped() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS[..3]);
    let versions = resolve(repo.path()).await;

    let analyzer = Arc::new(TreeReadingAnalyzer {
        fail_on: Some(semver::Version::new(1, 1, 0)),
        ..TreeReadingAnalyzer::new()
    });
    let pipeline = pipeline(repo.path(), data.path(), analyzer, true).await;
    let output = data.path().join("metrics.csv");

    let summary = pipeline
        .run(&versions, &output, "main", &ProgressTracker::hidden(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.computed, 2);
    assert_eq!(summary.failed, vec![semver::Version::new(1, 1, 0)]);
    let rows = table_rows(&output);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| !row.starts_with("1.1.0,")));
    assert_eq!(current_branch(repo.path()), "main");
}

#[tokio::test]
async fn missing_analyzer_program_aborts_the_run() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    tagged_repo(repo.path(), &VERSIONS[..2]);
    let versions = resolve(repo.path()).await;

    let analyzer = Arc::new(CommandAnalyzer::new(
        "relmine-test-no-such-analyzer",
        vec!["{tree}".into(), "{output}".into()],
    ));
    let pipeline = pipeline(repo.path(), data.path(), analyzer, true).await;

    let err = pipeline
        .run(
            &versions,
            &data.path().join("metrics.csv"),
            "main",
            &ProgressTracker::hidden(),
            std::future::pending(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Analyzer(AnalyzerError::Launch { .. })));
    assert_eq!(current_branch(repo.path()), "main");
}
