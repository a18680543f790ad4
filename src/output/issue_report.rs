//! The bug report: one row per issue, joined with its matched commit.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use super::{OutputError, ensure_parent};
use crate::constants::NOT_AVAILABLE;
use crate::models::{CommitMatch, Issue, IssueKey};

pub const REPORT_HEADER: [&str; 7] = [
    "Bug ID",
    "Key",
    "Summary",
    "Fix Versions",
    "Affected Versions",
    "Commit ID",
    "File Paths",
];

/// Counts gathered while writing a report.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub issues: usize,
    pub with_commit: usize,
    pub without_commit: usize,
}

/// Issue report writer.
#[derive(Debug, Clone, Default)]
pub struct IssueReport {
    /// Shorten commit ids to this many characters.
    abbrev: Option<usize>,
}

impl IssueReport {
    pub fn new(abbrev: Option<usize>) -> Self {
        Self { abbrev }
    }

    /// Write the report to `path`, replacing any previous file.
    pub fn write_file(
        &self,
        path: &Path,
        issues: &[Issue],
        matches: &HashMap<IssueKey, CommitMatch>,
    ) -> Result<ReportSummary, OutputError> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(file, issues, matches).map_err(|source| OutputError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write<W: io::Write>(
        &self,
        writer: W,
        issues: &[Issue],
        matches: &HashMap<IssueKey, CommitMatch>,
    ) -> Result<ReportSummary, csv::Error> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(REPORT_HEADER)?;

        let mut summary = ReportSummary::default();
        for issue in issues {
            let found = matches.get(&issue.key).filter(|m| m.is_found());
            csv.write_record(self.row(issue, found))?;

            summary.issues += 1;
            if found.is_some() {
                summary.with_commit += 1;
            } else {
                summary.without_commit += 1;
            }
        }
        csv.flush()?;
        Ok(summary)
    }

    fn row(&self, issue: &Issue, found: Option<&CommitMatch>) -> [String; 7] {
        let key = &issue.key;
        if issue.fix_versions.is_empty() {
            tracing::warn!("{key}: no fix versions");
        }
        if issue.affected_versions.is_empty() {
            tracing::debug!("{key}: no affected versions");
        }

        let (commit, files) = match found.and_then(|m| m.commit.as_deref().map(|c| (c, &m.files))) {
            Some((commit, files)) => {
                if files.is_empty() {
                    tracing::warn!("{key}: matched commit {commit} changed no files");
                }
                (self.commit_id(commit), join_or_na(files))
            }
            None => {
                tracing::warn!("{key}: no matching commit");
                (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string())
            }
        };

        [
            issue.id.clone(),
            key.to_string(),
            issue.summary.clone().unwrap_or_default(),
            join_or_na(&issue.fix_versions),
            join_or_na(&issue.affected_versions),
            commit,
            files,
        ]
    }

    fn commit_id(&self, commit: &str) -> String {
        match self.abbrev {
            Some(len) => commit.chars().take(len).collect(),
            None => commit.to_string(),
        }
    }
}

fn join_or_na(values: &[String]) -> String {
    if values.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        values.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn issue(key: &str, fix: &[&str]) -> Issue {
        Issue {
            id: "100".into(),
            key: IssueKey::new(key),
            summary: Some("NPE, in planner".into()),
            fix_versions: fix.iter().map(|s| s.to_string()).collect(),
            affected_versions: Vec::new(),
        }
    }

    fn render(report: &IssueReport, issues: &[Issue], matches: &HashMap<IssueKey, CommitMatch>) -> String {
        let mut buf = Vec::new();
        report.write(&mut buf, issues, matches).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn found_and_missing_rows() {
        let issues = vec![issue("HIVE-1", &["2.0.0", "2.1.0"]), issue("HIVE-2", &[])];
        let mut matches = HashMap::new();
        matches.insert(
            IssueKey::new("HIVE-1"),
            CommitMatch::found(
                IssueKey::new("HIVE-1"),
                "0123456789abcdef",
                vec!["a.java".into(), "b.java".into()],
            ),
        );
        matches.insert(IssueKey::new("HIVE-2"), CommitMatch::not_found(IssueKey::new("HIVE-2")));

        let text = render(&IssueReport::default(), &issues, &matches);
        assert_eq!(
            text,
            "Bug ID,Key,Summary,Fix Versions,Affected Versions,Commit ID,File Paths\n\
             100,HIVE-1,\"NPE, in planner\",\"2.0.0, 2.1.0\",N/A,0123456789abcdef,\"a.java, b.java\"\n\
             100,HIVE-2,\"NPE, in planner\",N/A,N/A,N/A,N/A\n"
        );
    }

    #[test]
    fn abbreviation_and_summary_counts() {
        let issues = vec![issue("HIVE-1", &["3.0.0"]), issue("HIVE-9", &["3.0.0"])];
        let mut matches = HashMap::new();
        matches.insert(
            IssueKey::new("HIVE-1"),
            CommitMatch::found(IssueKey::new("HIVE-1"), "0123456789abcdef", vec!["x".into()]),
        );

        let mut buf = Vec::new();
        let summary = IssueReport::new(Some(7)).write(&mut buf, &issues, &matches).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(",0123456,x\n"));
        assert_eq!(
            summary,
            ReportSummary {
                issues: 2,
                with_commit: 1,
                without_commit: 1,
            }
        );
    }

    #[test]
    fn found_commit_without_files() {
        let issues = vec![issue("HIVE-3", &["2.0.0"])];
        let mut matches = HashMap::new();
        matches.insert(
            IssueKey::new("HIVE-3"),
            CommitMatch::found(IssueKey::new("HIVE-3"), "abc", Vec::new()),
        );
        let text = render(&IssueReport::default(), &issues, &matches);
        assert!(text.ends_with(",abc,N/A\n"));
    }

    #[test]
    fn write_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/bugs.csv");
        let summary = IssueReport::default()
            .write_file(&path, &[], &HashMap::new())
            .unwrap();
        assert_eq!(summary.issues, 0);
        assert!(path.exists());
    }
}
