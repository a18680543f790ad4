//! The aggregated metrics table.
//!
//! One row per (version, file), identity columns first. Rows are flushed
//! after every version, so an interrupted run leaves only whole versions
//! on disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::{OutputError, ensure_parent};
use crate::models::{FileMetrics, MetricSet, MetricsRecord, VersionCommit};

pub struct MetricsTable {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl MetricsTable {
    /// Create (or truncate) the table and write its header.
    pub fn create(path: &Path, metrics: &MetricSet) -> Result<Self, OutputError> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut table = Self {
            path: path.to_path_buf(),
            writer: csv::Writer::from_writer(file),
            rows: 0,
        };
        table
            .writer
            .write_record(metrics.output_header())
            .map_err(|e| table.csv_error(e))?;
        table.flush()?;
        Ok(table)
    }

    /// Append all rows of one version. Returns the number written.
    pub fn append(&mut self, release: &VersionCommit, rows: &[FileMetrics]) -> Result<usize, OutputError> {
        for row in rows {
            let record = MetricsRecord::new(release, row).into_row();
            self.writer.write_record(&record).map_err(|e| self.csv_error(e))?;
        }
        self.flush()?;
        self.rows += rows.len();
        Ok(rows.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn csv_error(&self, source: csv::Error) -> OutputError {
        OutputError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
