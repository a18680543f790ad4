//! Filesystem store for per-version artifacts.
//!
//! Artifacts are plain files named `<key>_metrics.csv` under
//! `<data_dir>/metrics/`. Writes go to a temporary sibling first and are
//! renamed into place, so an artifact either exists complete or not at all.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix shared by every artifact file.
pub const ARTIFACT_SUFFIX: &str = "_metrics.csv";

/// Filesystem-based artifact store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the artifact for `key`.
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{ARTIFACT_SUFFIX}"))
    }

    /// Whether a complete artifact for `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).is_file()
    }

    /// Write an artifact atomically. `fill` receives the temporary file.
    pub fn put_with<F>(&self, key: &str, fill: F) -> io::Result<PathBuf>
    where
        F: FnOnce(&mut fs::File) -> io::Result<()>,
    {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = self.dir.join(format!(".{key}{ARTIFACT_SUFFIX}.tmp"));

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            fill(&mut file)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map(|()| path)
    }

    /// Remove one artifact, if present.
    pub fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Remove every artifact. Returns what was there before.
    pub fn clear(&self) -> io::Result<CacheStats> {
        let stats = self.stats()?;
        if self.dir.exists() {
            for path in self.artifacts()? {
                fs::remove_file(path)?;
            }
        }
        Ok(stats)
    }

    /// Count artifacts and their total size.
    pub fn stats(&self) -> io::Result<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.dir.exists() {
            return Ok(stats);
        }
        for path in self.artifacts()? {
            stats.entries += 1;
            stats.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn artifacts(&self) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX) && !n.starts_with('.'));
            if is_artifact && path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Statistics about the cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of artifacts.
    pub entries: usize,
    /// Total size in bytes.
    pub total_bytes: u64,
}

impl CacheStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;
        const GB: u64 = 1024 * MB;

        if self.total_bytes >= GB {
            format!("{:.1} GiB", self.total_bytes as f64 / GB as f64)
        } else if self.total_bytes >= MB {
            format!("{:.1} MiB", self.total_bytes as f64 / MB as f64)
        } else if self.total_bytes >= KB {
            format!("{:.1} KiB", self.total_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(store: &FileStore, key: &str, body: &str) -> PathBuf {
        store
            .put_with(key, |f| f.write_all(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn put_then_contains() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("metrics"));
        assert!(!store.contains("2.0.0"));

        let path = write(&store, "2.0.0", "File,CountLine\n");
        assert_eq!(path, dir.path().join("metrics/2.0.0_metrics.csv"));
        assert!(store.contains("2.0.0"));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let result = store.put_with("2.0.0", |f| {
            f.write_all(b"partial")?;
            Err(io::Error::other("analyzer died"))
        });
        assert!(result.is_err());
        assert!(!store.contains("2.0.0"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn stats_count_only_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        write(&store, "1.0.0", "a");
        write(&store, "1.1.0", "bb");
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 3);
    }

    #[test]
    fn stats_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing"));
        assert_eq!(store.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn clear_removes_artifacts_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        write(&store, "1.0.0", "a");
        fs::write(dir.path().join("keep.txt"), "x").unwrap();

        let before = store.clear().unwrap();
        assert_eq!(before.entries, 1);
        assert!(!store.contains("1.0.0"));
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path()).remove("9.9.9").unwrap();
    }

    #[test]
    fn human_size_units() {
        let size = |total_bytes| CacheStats { entries: 1, total_bytes }.human_size();
        assert_eq!(size(500), "500 B");
        assert_eq!(size(2048), "2.0 KiB");
        assert_eq!(size(2 * 1024 * 1024), "2.0 MiB");
        assert_eq!(size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
