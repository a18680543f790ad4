//! Metric names and per-file metric rows.

use indexmap::IndexSet;
use semver::Version;

use super::version::VersionCommit;

/// Identity columns preceding the metric columns in the output table.
pub const IDENTITY_COLUMNS: [&str; 3] = ["Version", "CommitId", "File"];

/// Name of the file-path column in analyzer tables.
pub const FILE_COLUMN: &str = "File";

/// Ordered, duplicate-free list of declared metric names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSet {
    names: Vec<String>,
}

impl MetricSet {
    /// Build a set from names, dropping blanks and repeated names
    /// (first occurrence wins).
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = IndexSet::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name.clone()) {
                tracing::warn!("duplicate metric name {name} ignored");
            }
        }
        Self {
            names: seen.into_iter().collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of fields in an analyzer row: the file path plus one per metric.
    pub fn row_width(&self) -> usize {
        self.names.len() + 1
    }

    /// Header of an analyzer table / cache artifact.
    pub fn table_header(&self) -> Vec<&str> {
        std::iter::once(FILE_COLUMN)
            .chain(self.names.iter().map(String::as_str))
            .collect()
    }

    /// Header of the aggregated output table.
    pub fn output_header(&self) -> Vec<&str> {
        IDENTITY_COLUMNS
            .iter()
            .copied()
            .chain(self.names.iter().map(String::as_str))
            .collect()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_METRICS.iter().copied())
    }
}

/// Metric values for one source file, in declared metric order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetrics {
    pub file: String,
    pub values: Vec<String>,
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRecord {
    pub version: Version,
    pub commit: String,
    pub file: String,
    pub values: Vec<String>,
}

impl MetricsRecord {
    pub fn new(release: &VersionCommit, metrics: &FileMetrics) -> Self {
        Self {
            version: release.version.clone(),
            commit: release.commit.clone(),
            file: metrics.file.clone(),
            values: metrics.values.clone(),
        }
    }

    /// Flatten into output columns: identity columns, then metric values.
    pub fn into_row(self) -> Vec<String> {
        let mut row = Vec::with_capacity(IDENTITY_COLUMNS.len() + self.values.len());
        row.push(self.version.to_string());
        row.push(self.commit);
        row.push(self.file);
        row.extend(self.values);
        row
    }
}
