//! Per-version metrics cache.
//!
//! A version whose artifact already exists is never analyzed again: the
//! pipeline reads the rows back instead of checking the commit out.

pub mod store;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::table::{has_header, parse_metrics_table, write_metrics_table};
use crate::models::{FileMetrics, MetricSet, VersionCommit};

pub use store::CacheStats;

/// Length of the commit prefix used in `version-commit` keys.
const KEY_COMMIT_LEN: usize = 12;

/// Errors from cache reads and writes.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read cached table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The artifact was written for a different metric list.
    #[error("cached table {path} does not have the header {expected}")]
    Schema { path: PathBuf, expected: String },
}

/// What identifies a cached artifact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CacheKeying {
    /// Version number only. Retagging a version does not invalidate it.
    #[default]
    Version,
    /// Version number plus commit prefix.
    VersionCommit,
}

/// A located cache artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
}

/// The cache of analyzer results, one artifact per version.
#[derive(Debug, Clone)]
pub struct MetricsCache {
    store: store::FileStore,
    keying: CacheKeying,
    enabled: bool,
}

impl MetricsCache {
    /// Cache rooted at `<data_dir>/metrics`.
    pub fn new(data_dir: &Path, keying: CacheKeying, enabled: bool) -> Self {
        Self {
            store: store::FileStore::new(data_dir.join("metrics")),
            keying,
            enabled,
        }
    }

    pub fn key(&self, release: &VersionCommit) -> String {
        match self.keying {
            CacheKeying::Version => release.version.to_string(),
            CacheKeying::VersionCommit => {
                format!("{}-{}", release.version, release.short_commit(KEY_COMMIT_LEN))
            }
        }
    }

    pub fn entry(&self, release: &VersionCommit) -> CacheEntry {
        let key = self.key(release);
        let path = self.store.key_path(&key);
        CacheEntry { key, path }
    }

    /// The artifact for `release`, if the cache is enabled and it exists.
    pub fn lookup(&self, release: &VersionCommit) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let entry = self.entry(release);
        self.store.contains(&entry.key).then_some(entry)
    }

    /// Read rows back from an artifact.
    ///
    /// Fails with [`CacheError::Schema`] when the artifact's header does not
    /// list exactly `metrics`, so a changed metric list is recomputed
    /// rather than served as empty rows.
    pub fn load(&self, entry: &CacheEntry, metrics: &MetricSet) -> Result<Vec<FileMetrics>, CacheError> {
        let bytes = fs::read(&entry.path).map_err(|source| CacheError::Io {
            path: entry.path.clone(),
            source,
        })?;
        let csv_error = |source| CacheError::Csv {
            path: entry.path.clone(),
            source,
        };
        if !has_header(bytes.as_slice(), metrics).map_err(csv_error)? {
            return Err(CacheError::Schema {
                path: entry.path.clone(),
                expected: metrics.table_header().join(","),
            });
        }
        let table = parse_metrics_table(bytes.as_slice(), metrics).map_err(csv_error)?;
        if table.malformed > 0 {
            tracing::warn!(
                "{} malformed row(s) in cached table {}",
                table.malformed,
                entry.path.display()
            );
        }
        Ok(table.rows)
    }

    /// Write the artifact for `release`. A no-op returning `None` when
    /// the cache is disabled.
    pub fn store(
        &self,
        release: &VersionCommit,
        metrics: &MetricSet,
        rows: &[FileMetrics],
    ) -> Result<Option<CacheEntry>, CacheError> {
        if !self.enabled {
            return Ok(None);
        }
        let entry = self.entry(release);
        self.store
            .put_with(&entry.key, |file| {
                write_metrics_table(file, metrics, rows).map_err(std::io::Error::other)
            })
            .map_err(|source| CacheError::Io {
                path: entry.path.clone(),
                source,
            })?;
        tracing::debug!("cached {} row(s) at {}", rows.len(), entry.path.display());
        Ok(Some(entry))
    }

    /// Drop the artifact for `release` so it is recomputed next time.
    pub fn invalidate(&self, release: &VersionCommit) -> Result<(), CacheError> {
        let entry = self.entry(release);
        self.store.remove(&entry.key).map_err(|source| CacheError::Io {
            path: entry.path,
            source,
        })
    }

    pub fn clear(&self) -> Result<CacheStats, CacheError> {
        self.store.clear().map_err(|source| self.io_error(source))
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        self.store.stats().map_err(|source| self.io_error(source))
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.store.path().to_path_buf(),
            source,
        }
    }
}
