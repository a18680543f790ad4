//! Issue-to-commit matching and the bug report, against a real repository.

mod common;

use std::collections::HashMap;
use std::path::Path;

use pretty_assertions::assert_eq;

use relmine::issues;
use relmine::matcher::{CommitMatcher, MatchError, MatchStrategy, MatchSummary};
use relmine::models::{CommitMatch, IssueKey};
use relmine::output::{IssueReport, ReportSummary};
use relmine::progress::BatchProgress;

use common::{commit_file, current_branch, init_repo};

/// Commits `HIVE-1` .. `HIVE-15`, each touching its own file. Returns the
/// commit hashes in key order.
fn fixed_repo(dir: &Path) -> Vec<String> {
    init_repo(dir);
    (1..=15)
        .map(|i| {
            commit_file(
                dir,
                &format!("src/Fix{i}.java"),
                &format!("class Fix{i} {{}}\n"),
                &format!("HIVE-{i}: fix bug number {i}\n\nDetails."),
            )
        })
        .collect()
}

fn keys(range: std::ops::RangeInclusive<usize>) -> Vec<IssueKey> {
    range.map(|i| IssueKey::new(format!("HIVE-{i}"))).collect()
}

#[tokio::test]
async fn every_key_appears_exactly_once() {
    let repo = tempfile::tempdir().unwrap();
    let commits = fixed_repo(repo.path());

    let matcher = CommitMatcher::new(repo.path(), MatchStrategy::Word.matcher())
        .with_workers(4)
        .with_batch_size(5);
    let mut input = keys(1..=20);
    input.extend(keys(3..=4));
    let progress = BatchProgress::hidden(20);

    let results = matcher.match_keys(&input, &progress).await;

    assert_eq!(results.len(), 20);
    assert_eq!(progress.done(), 20);
    assert_eq!(MatchSummary::of(&results), MatchSummary { found: 15, not_found: 5 });
    for (i, commit) in commits.iter().enumerate() {
        let key = IssueKey::new(format!("HIVE-{}", i + 1));
        assert_eq!(
            results[&key],
            CommitMatch::found(key.clone(), commit.clone(), vec![format!("src/Fix{}.java", i + 1)])
        );
    }
    for key in keys(16..=20) {
        assert_eq!(results[&key], CommitMatch::not_found(key.clone()));
    }
}

#[tokio::test]
async fn substring_strategy_takes_most_recent_prefix_match() {
    let repo = tempfile::tempdir().unwrap();
    let commits = fixed_repo(repo.path());

    let matcher = CommitMatcher::new(repo.path(), MatchStrategy::Substring.matcher()).with_workers(2);
    let found = matcher.match_one(&IssueKey::new("HIVE-1")).await.unwrap();

    // HIVE-15 is the newest commit containing "HIVE-1".
    assert_eq!(found.commit.as_deref(), Some(commits[14].as_str()));
}

#[tokio::test]
async fn results_do_not_depend_on_worker_count() {
    let repo = tempfile::tempdir().unwrap();
    fixed_repo(repo.path());
    let input = keys(1..=18);

    let mut runs: Vec<HashMap<IssueKey, CommitMatch>> = Vec::new();
    for workers in [1, 3, 8] {
        let matcher = CommitMatcher::new(repo.path(), MatchStrategy::Word.matcher())
            .with_workers(workers)
            .with_batch_size(4);
        runs.push(matcher.match_keys(&input, &BatchProgress::hidden(input.len())).await);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[tokio::test]
async fn shutdown_abandons_matching() {
    let repo = tempfile::tempdir().unwrap();
    fixed_repo(repo.path());
    let input = keys(1..=20);

    let matcher = CommitMatcher::new(repo.path(), MatchStrategy::Word.matcher());
    let err = matcher
        .run(&input, &BatchProgress::hidden(input.len()), std::future::ready(()))
        .await
        .unwrap_err();

    let MatchError::Interrupted { total, .. } = err;
    assert_eq!(total, 20);
    assert_eq!(current_branch(repo.path()), "main");
}

#[tokio::test]
async fn saved_issues_feed_the_report() {
    let repo = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let commits = fixed_repo(repo.path());

    let issues_path = data.path().join("issues.json");
    std::fs::write(
        &issues_path,
        r#"{"startAt": 0, "total": 2, "issues": [
            {"id": "1002", "key": "HIVE-2", "fields": {
                "summary": "Wrong plan", "fixVersions": [{"name": "2.0.0"}, {"name": "2.1.0"}],
                "versions": [{"name": "1.2.0"}]}},
            {"id": "1099", "key": "HIVE-99", "fields": {
                "summary": "Never fixed", "fixVersions": [], "versions": null}}
        ]}"#,
    )
    .unwrap();

    let loaded = issues::load_issues(&issues_path).unwrap();
    let keys = issues::issue_keys(&loaded);
    let matcher = CommitMatcher::new(repo.path(), MatchStrategy::Word.matcher()).with_workers(2);
    let matches = matcher
        .run(&keys, &BatchProgress::hidden(keys.len()), std::future::pending())
        .await
        .unwrap();

    let report_path = data.path().join("out/bugs.csv");
    let summary = IssueReport::new(Some(10))
        .write_file(&report_path, &loaded, &matches)
        .unwrap();

    assert_eq!(
        summary,
        ReportSummary {
            issues: 2,
            with_commit: 1,
            without_commit: 1,
        }
    );
    let report = std::fs::read_to_string(&report_path).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Bug ID,Key,Summary,Fix Versions,Affected Versions,Commit ID,File Paths".to_string(),
            format!("1002,HIVE-2,Wrong plan,\"2.0.0, 2.1.0\",1.2.0,{},src/Fix2.java", &commits[1][..10]),
            "1099,HIVE-99,Never fixed,N/A,N/A,N/A,N/A".to_string(),
        ]
    );
}
