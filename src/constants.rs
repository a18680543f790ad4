//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and built-in defaults so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "relmine";

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple (set by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.relmine.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".relmine.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "relmine";

/// User agent sent to the issue tracker.
pub const USER_AGENT: &str = concat!("relmine/", env!("CARGO_PKG_VERSION"));

/// Sentinel written to reports for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

// ── Defaults ────────────────────────────────────────────────────────

/// Release tags look like `release-2.3.1`, optionally behind a `prefix/`.
pub const DEFAULT_TAG_PATTERN: &str =
    r"^(?:.*/)?release-(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)$";

/// Metrics requested from the analyzer, in output column order.
pub const DEFAULT_METRICS: &[&str] = &[
    "AvgCyclomatic",
    "AvgCyclomaticModified",
    "AvgCyclomaticStrict",
    "CountInput",
    "CountOutput",
    "CountPath",
    "CountLine",
    "CountStmt",
    "MaxNesting",
];

pub const DEFAULT_JIRA_URL: &str = "https://issues.apache.org/jira";

pub const DEFAULT_JQL: &str = "project = \"HIVE\" AND issuetype = \"Bug\" \
     AND status = \"Resolved\" AND resolution = \"Fixed\" AND fixVersion >= \"2.0.0\"";

/// Issue fields requested from the tracker.
pub const JIRA_FIELDS: &str = "id,key,fixVersions,versions,summary";

pub const DEFAULT_BATCH_SIZE: usize = 10;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_REPO_PATH: &str = "RELMINE_REPO_PATH";
pub const ENV_REPO_URL: &str = "RELMINE_REPO_URL";
pub const ENV_OUTPUT: &str = "RELMINE_OUTPUT";
pub const ENV_DATA_DIR: &str = "RELMINE_DATA_DIR";
pub const ENV_ANALYZER: &str = "RELMINE_ANALYZER";
pub const ENV_ANALYZER_PROGRAM: &str = "RELMINE_ANALYZER_PROGRAM";
pub const ENV_WORKERS: &str = "RELMINE_WORKERS";
pub const ENV_JIRA_URL: &str = "RELMINE_JIRA_URL";
pub const ENV_JIRA_JQL: &str = "RELMINE_JIRA_JQL";
