//! CSV writers: the aggregated metrics table and the issue report.

pub mod issue_report;
pub mod metrics_table;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use issue_report::{IssueReport, ReportSummary};
pub use metrics_table::MetricsTable;

/// Errors from writing output files.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Create the parent directory of an output file.
fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
