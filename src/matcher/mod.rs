//! Issue key → commit association.
//!
//! Each key is looked up by scanning the full commit history for the
//! first message that mentions it. Keys are independent, so lookups run
//! in parallel: keys are cut into fixed-size batches, and within a batch
//! at most `workers` lookups run at once, each with its own `git log`
//! process. The working tree is never touched.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::git::RepositoryError;
use crate::git::history::{changed_files, find_first_commit};
use crate::models::{CommitMatch, IssueKey};
use crate::progress::BatchProgress;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("interrupted after {completed} of {total} key(s)")]
    Interrupted { completed: usize, total: usize },
}

/// Decides whether a commit message refers to an issue key.
pub trait MessageMatcher: Send + Sync {
    fn matches(&self, key: &IssueKey, message: &str) -> bool;
}

/// The key appears anywhere in the message. `HIVE-1` also matches
/// `HIVE-12`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl MessageMatcher for SubstringMatcher {
    fn matches(&self, key: &IssueKey, message: &str) -> bool {
        message.contains(key.as_str())
    }
}

/// The key appears as a whole token: not preceded or followed by an
/// alphanumeric character, `-` or `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordBoundaryMatcher;

impl MessageMatcher for WordBoundaryMatcher {
    fn matches(&self, key: &IssueKey, message: &str) -> bool {
        let key = key.as_str();
        if key.is_empty() {
            return false;
        }
        let is_word = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
        message.match_indices(key).any(|(start, _)| {
            let before = message[..start].chars().next_back();
            let after = message[start + key.len()..].chars().next();
            !before.is_some_and(is_word) && !after.is_some_and(is_word)
        })
    }
}

/// Configurable choice of [`MessageMatcher`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Substring,
    Word,
}

impl MatchStrategy {
    pub fn matcher(self) -> Arc<dyn MessageMatcher> {
        match self {
            Self::Substring => Arc::new(SubstringMatcher),
            Self::Word => Arc::new(WordBoundaryMatcher),
        }
    }
}

/// Available parallelism minus one, and at least one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Found / not-found counts for a set of matches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub found: usize,
    pub not_found: usize,
}

impl MatchSummary {
    pub fn of(matches: &HashMap<IssueKey, CommitMatch>) -> Self {
        let found = matches.values().filter(|m| m.is_found()).count();
        Self {
            found,
            not_found: matches.len() - found,
        }
    }
}

pub struct CommitMatcher {
    repo: PathBuf,
    strategy: Arc<dyn MessageMatcher>,
    workers: usize,
    batch_size: usize,
}

impl CommitMatcher {
    pub fn new(repo: impl Into<PathBuf>, strategy: Arc<dyn MessageMatcher>) -> Self {
        Self {
            repo: repo.into(),
            strategy,
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Look up a single key. Errors are returned, not swallowed.
    pub async fn match_one(&self, key: &IssueKey) -> Result<CommitMatch, RepositoryError> {
        search(&self.repo, self.strategy.as_ref(), key).await
    }

    /// Look up every key. Each distinct key appears exactly once in the
    /// result; lookups that fail are logged and reported as not found.
    pub async fn match_keys(&self, keys: &[IssueKey], progress: &BatchProgress) -> HashMap<IssueKey, CommitMatch> {
        let unique: Vec<&IssueKey> = keys.iter().collect::<IndexSet<_>>().into_iter().collect();
        tracing::info!(
            "matching {} key(s) with {} worker(s), batches of {}",
            unique.len(),
            self.workers,
            self.batch_size
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut results = HashMap::with_capacity(unique.len());

        for batch in unique.chunks(self.batch_size) {
            let mut join_set = JoinSet::new();
            for &key in batch {
                let key = key.clone();
                let repo = self.repo.clone();
                let strategy = Arc::clone(&self.strategy);
                let sem = Arc::clone(&semaphore);
                join_set.spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    let result = search(&repo, strategy.as_ref(), &key).await;
                    (key, result)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((key, Ok(found))) => {
                        results.insert(key, found);
                    }
                    Ok((key, Err(e))) => {
                        tracing::error!("{key}: commit search failed: {e}");
                        results.insert(key.clone(), CommitMatch::not_found(key));
                    }
                    Err(e) => tracing::error!("commit search task failed: {e}"),
                }
            }

            // Keys whose task panicked have no entry yet.
            for &key in batch {
                results
                    .entry(key.clone())
                    .or_insert_with(|| CommitMatch::not_found(key.clone()));
            }
            progress.advance(batch.len());
        }

        let summary = MatchSummary::of(&results);
        tracing::debug!("{} key(s) matched, {} not found", summary.found, summary.not_found);
        results
    }

    /// [`match_keys`](Self::match_keys), abandoned when `shutdown` resolves.
    /// In-flight lookups are aborted and their results discarded.
    pub async fn run<F>(
        &self,
        keys: &[IssueKey],
        progress: &BatchProgress,
        shutdown: F,
    ) -> Result<HashMap<IssueKey, CommitMatch>, MatchError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            results = self.match_keys(keys, progress) => Ok(results),
            () = shutdown => Err(MatchError::Interrupted {
                completed: progress.done(),
                total: keys.len(),
            }),
        }
    }
}

async fn search(repo: &Path, strategy: &dyn MessageMatcher, key: &IssueKey) -> Result<CommitMatch, RepositoryError> {
    let Some(commit) = find_first_commit(repo, |message| strategy.matches(key, message)).await? else {
        tracing::debug!("{key}: no commit found");
        return Ok(CommitMatch::not_found(key.clone()));
    };
    let files = changed_files(repo, &commit).await?;
    tracing::debug!("{key}: {commit} ({} file(s))", files.len());
    Ok(CommitMatch::found(key.clone(), commit, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::*;

    fn key(k: &str) -> IssueKey {
        IssueKey::new(k)
    }

    #[test]
    fn substring_matches_prefix_keys() {
        let m = SubstringMatcher;
        assert!(m.matches(&key("HIVE-1"), "HIVE-1: fix NPE"));
        assert!(m.matches(&key("HIVE-1"), "HIVE-12: unrelated"));
        assert!(!m.matches(&key("HIVE-2"), "HIVE-1: fix NPE"));
    }

    #[test]
    fn word_boundary_rejects_longer_tokens() {
        let m = WordBoundaryMatcher;
        assert!(m.matches(&key("HIVE-1"), "HIVE-1: fix NPE"));
        assert!(m.matches(&key("HIVE-1"), "Revert \"HIVE-1\""));
        assert!(m.matches(&key("HIVE-1"), "HIVE-12 and HIVE-1."));
        assert!(!m.matches(&key("HIVE-1"), "HIVE-12: unrelated"));
        assert!(!m.matches(&key("HIVE-1"), "XHIVE-1"));
        assert!(!m.matches(&key("HIVE-1"), "HIVE-1_backport"));
        assert!(!m.matches(&key(""), "anything"));
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("word".parse::<MatchStrategy>().unwrap(), MatchStrategy::Word);
        assert_eq!(MatchStrategy::default().to_string(), "substring");
    }

    #[test]
    fn workers_never_zero() {
        assert!(default_workers() >= 1);
        let m = CommitMatcher::new("/tmp", MatchStrategy::Substring.matcher())
            .with_workers(0)
            .with_batch_size(0);
        assert_eq!(m.workers, 1);
        assert_eq!(m.batch_size, 1);
    }

    #[tokio::test]
    async fn match_one_reports_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let commit = commit_file(dir.path(), "ql/Planner.java", "x\n", "HIVE-7: planner fix");

        let matcher = CommitMatcher::new(dir.path(), MatchStrategy::Substring.matcher());
        let found = matcher.match_one(&key("HIVE-7")).await.unwrap();
        assert_eq!(found.commit.as_deref(), Some(commit.as_str()));
        assert_eq!(found.files, vec!["ql/Planner.java"]);

        let missing = matcher.match_one(&key("HIVE-8")).await.unwrap();
        assert!(!missing.is_found());
    }

    #[tokio::test]
    async fn duplicate_keys_collapse() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let matcher = CommitMatcher::new(dir.path(), MatchStrategy::Substring.matcher()).with_workers(2);
        let keys = vec![key("HIVE-1"), key("HIVE-1"), key("HIVE-2")];
        let progress = BatchProgress::hidden(keys.len());
        let results = matcher.match_keys(&keys, &progress).await;
        assert_eq!(results.len(), 2);
        assert_eq!(progress.done(), 2);
    }

    #[tokio::test]
    async fn broken_repository_yields_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = CommitMatcher::new(dir.path(), MatchStrategy::Substring.matcher());
        let keys = vec![key("HIVE-1"), key("HIVE-2")];
        let results = matcher.match_keys(&keys, &BatchProgress::hidden(2)).await;
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|m| !m.is_found()));
    }

    #[tokio::test]
    async fn shutdown_abandons_matching() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let matcher = CommitMatcher::new(dir.path(), MatchStrategy::Substring.matcher());
        let keys = vec![key("HIVE-1")];
        let err = matcher
            .run(&keys, &BatchProgress::hidden(1), std::future::ready(()))
            .await;
        assert!(matches!(err, Err(MatchError::Interrupted { total: 1, .. })));
    }
}
