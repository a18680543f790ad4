//! External code-metrics analyzer integration.
//!
//! The analyzer is an opaque subprocess: it reads a checked-out tree from
//! disk and writes a row-oriented table with one row per source file.
//! [`extract`] runs it, parses the table, and removes whatever the
//! analyzer left behind.

pub mod command;
pub mod table;
pub mod understand;

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AnalyzerConfig;
use crate::git::Checkout;
use crate::models::{FileMetrics, MetricSet};

pub use command::CommandAnalyzer;
pub use understand::UnderstandAnalyzer;

/// Longest stderr excerpt kept in an error.
const STDERR_EXCERPT: usize = 2000;

/// Errors from the analyzer.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// The analyzer binary could not be started at all.
    #[error("failed to launch analyzer `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analyzer `{program}` exited with {status}: {stderr}")]
    Execution {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("analyzer produced no table at {0}")]
    MissingOutput(PathBuf),

    #[error("analyzer I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read analyzer table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("analyzer not configured: {0}")]
    NotConfigured(String),
}

impl AnalyzerError {
    /// Whether the error must abort the whole run rather than just the
    /// version being analyzed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::NotConfigured(_))
    }
}

/// Which analyzer back-end to run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalyzerKind {
    /// SciTools Understand (`und`).
    #[default]
    Understand,
    /// Any program driven by an argument template.
    Command,
}

/// Everything an analyzer needs for one version.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// Root of the checked-out tree.
    pub tree: &'a Path,
    pub version: &'a Version,
    pub commit: &'a str,
    /// Scratch directory for this version; the table goes here.
    pub work_dir: &'a Path,
    pub metrics: &'a MetricSet,
}

impl AnalysisRequest<'_> {
    /// Default location of the analyzer's table.
    pub fn table_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}_metrics.csv", self.version))
    }
}

/// Where the analyzer put its results.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub table: PathBuf,
    /// Intermediate files or directories to delete once the table is read.
    pub artifacts: Vec<PathBuf>,
}

/// A code-metrics analyzer.
#[async_trait]
pub trait MetricsAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Analyze the tree described by `request` and write a metrics table.
    ///
    /// Returns [`AnalyzerError::Launch`] when the program cannot be
    /// started and [`AnalyzerError::Execution`] when it exits non-zero.
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisOutput, AnalyzerError>;
}

/// Build the analyzer selected in the configuration.
pub fn from_config(config: &AnalyzerConfig) -> Result<Arc<dyn MetricsAnalyzer>, AnalyzerError> {
    match config.kind {
        AnalyzerKind::Understand => Ok(Arc::new(UnderstandAnalyzer::new(
            config.program.as_deref().unwrap_or(understand::DEFAULT_PROGRAM),
            config.languages.clone(),
        ))),
        AnalyzerKind::Command => {
            let program = config.program.as_deref().ok_or_else(|| {
                AnalyzerError::NotConfigured("`analyzer.program` is required for the command analyzer".into())
            })?;
            Ok(Arc::new(CommandAnalyzer::new(program, config.args.clone())))
        }
    }
}

/// Run the analyzer on a checked-out tree and return its rows.
///
/// The checkout lease is borrowed for the whole call, so the tree cannot
/// move while the analyzer reads it. Artifacts are removed after the
/// table has been parsed; on failure they are left for inspection.
pub async fn extract(
    analyzer: &dyn MetricsAnalyzer,
    checkout: &Checkout<'_>,
    version: &Version,
    metrics: &MetricSet,
    work_dir: &Path,
) -> Result<Vec<FileMetrics>, AnalyzerError> {
    let scratch = work_dir.join(format!("{version}.work"));
    tokio::fs::create_dir_all(&scratch)
        .await
        .map_err(|source| AnalyzerError::Io {
            path: scratch.clone(),
            source,
        })?;

    let request = AnalysisRequest {
        tree: checkout.path(),
        version,
        commit: checkout.commit(),
        work_dir: &scratch,
        metrics,
    };
    tracing::debug!("analyzing {version} with {}", analyzer.name());
    let output = analyzer.analyze(&request).await?;

    let bytes = match tokio::fs::read(&output.table).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnalyzerError::MissingOutput(output.table));
        }
        Err(source) => {
            return Err(AnalyzerError::Io {
                path: output.table,
                source,
            });
        }
    };
    let table = table::parse_metrics_table(bytes.as_slice(), metrics).map_err(|source| AnalyzerError::Table {
        path: output.table.clone(),
        source,
    })?;
    if table.malformed > 0 {
        tracing::warn!("{version}: dropped {} malformed row(s) from analyzer output", table.malformed);
    }
    tracing::debug!("{version}: parsed {} file row(s)", table.rows.len());

    for path in output.artifacts.iter().chain([&output.table, &scratch]) {
        remove_path(path).await;
    }

    Ok(table.rows)
}

async fn remove_path(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!("failed to remove analyzer artifact {}: {e}", path.display());
    }
}

/// Run one analyzer step and require a zero exit status.
pub(crate) async fn run_tool(program: &str, args: &[String], cwd: &Path) -> Result<Output, AnalyzerError> {
    tracing::debug!("running {program} {}", args.join(" "));
    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| AnalyzerError::Launch {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(AnalyzerError::Execution {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: excerpt(&output.stderr),
        });
    }
    Ok(output)
}

/// Trailing part of a stderr stream, lossily decoded.
fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_EXCERPT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process analyzers for tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Writes a fixed table for every version and counts its calls.
    pub struct FixedAnalyzer {
        pub table: String,
        pub calls: AtomicUsize,
    }

    impl FixedAnalyzer {
        pub fn new(table: impl Into<String>) -> Self {
            Self {
                table: table.into(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricsAnalyzer for FixedAnalyzer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisOutput, AnalyzerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let table = request.table_path();
            let db = request.work_dir.join("project.db");
            std::fs::write(&table, &self.table).unwrap();
            std::fs::write(&db, "db").unwrap();
            Ok(AnalysisOutput {
                table,
                artifacts: vec![db],
            })
        }
    }
}
