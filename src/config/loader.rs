//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `--config <file>`
//! 4. `.relmine.toml` in the working directory
//! 5. `~/.config/relmine/config.toml` (global defaults)
//! 6. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analyzer::AnalyzerKind;
use crate::cache::CacheKeying;
use crate::constants;
use crate::env::Env;
use crate::matcher::{MatchStrategy, default_workers};

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub metrics: MetricsConfig,
    pub analyzer: AnalyzerConfig,
    pub matcher: MatcherConfig,
    pub jira: JiraConfig,
}

/// The mined repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub path: PathBuf,
    /// Clone source used when `path` does not exist yet.
    pub url: Option<String>,
    /// Branch to restore after a run. Detected when unset.
    pub primary_branch: Option<String>,
    pub tag_pattern: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/repo"),
            url: None,
            primary_branch: None,
            tag_pattern: constants::DEFAULT_TAG_PATTERN.to_string(),
        }
    }
}

/// Metrics extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub names: Vec<String>,
    /// Aggregated output table.
    pub output: PathBuf,
    /// Holds the cache (`metrics/`) and analyzer scratch space (`work/`).
    pub data_dir: PathBuf,
    pub cache_key: CacheKeying,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            names: constants::DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            output: PathBuf::from("data/metrics.csv"),
            data_dir: PathBuf::from("data"),
            cache_key: CacheKeying::default(),
        }
    }
}

/// External analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub kind: AnalyzerKind,
    /// Program to run. `und` when unset for the Understand back-end;
    /// required for the command back-end.
    pub program: Option<String>,
    pub languages: Vec<String>,
    /// Argument template for the command back-end.
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            kind: AnalyzerKind::default(),
            program: None,
            languages: vec!["java".to_string(), "c++".to_string()],
            args: vec!["{tree}".to_string(), "{output}".to_string()],
        }
    }
}

/// Issue → commit matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Concurrent lookups. Available parallelism − 1 when unset.
    pub workers: Option<usize>,
    pub batch_size: usize,
    pub strategy: MatchStrategy,
    /// Shorten commit ids in the report to this many characters.
    pub abbrev: Option<usize>,
    /// Issue/commit report.
    pub output: PathBuf,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            strategy: MatchStrategy::default(),
            abbrev: None,
            output: PathBuf::from("data/bugs.csv"),
        }
    }
}

impl MatcherConfig {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }
}

/// Issue tracker query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: String,
    pub jql: String,
    pub page_size: usize,
    pub max_issues: Option<usize>,
    /// Where `relmine issues` saves the issue list.
    pub output: PathBuf,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_JIRA_URL.to_string(),
            jql: constants::DEFAULT_JQL.to_string(),
            page_size: 1000,
            max_issues: None,
            output: PathBuf::from("data/issues.json"),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads the global config, the config in `cwd`, then `explicit`, and
    /// finally applies environment variable overrides. An explicit file
    /// that does not exist is an error; the implicit ones are optional.
    pub fn load(explicit: Option<&Path>, cwd: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge(Self::load_file(&global_path)?);
            }
        }

        if let Some(dir) = cwd {
            let local_path = dir.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                config.merge(Self::load_file(&local_path)?);
            }
        }

        if let Some(path) = explicit {
            config.merge(Self::load_file(path)?);
        }

        config.apply_env_vars(env);
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!("loading config from {}", path.display());
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for
    /// non-default values).
    fn merge(&mut self, other: Config) {
        let repo = RepositoryConfig::default();
        if other.repository.path != repo.path {
            self.repository.path = other.repository.path;
        }
        if other.repository.url.is_some() {
            self.repository.url = other.repository.url;
        }
        if other.repository.primary_branch.is_some() {
            self.repository.primary_branch = other.repository.primary_branch;
        }
        if other.repository.tag_pattern != repo.tag_pattern {
            self.repository.tag_pattern = other.repository.tag_pattern;
        }

        let metrics = MetricsConfig::default();
        if other.metrics.names != metrics.names {
            self.metrics.names = other.metrics.names;
        }
        if other.metrics.output != metrics.output {
            self.metrics.output = other.metrics.output;
        }
        if other.metrics.data_dir != metrics.data_dir {
            self.metrics.data_dir = other.metrics.data_dir;
        }
        if other.metrics.cache_key != metrics.cache_key {
            self.metrics.cache_key = other.metrics.cache_key;
        }

        let analyzer = AnalyzerConfig::default();
        if other.analyzer.kind != analyzer.kind {
            self.analyzer.kind = other.analyzer.kind;
        }
        if other.analyzer.program.is_some() {
            self.analyzer.program = other.analyzer.program;
        }
        if other.analyzer.languages != analyzer.languages {
            self.analyzer.languages = other.analyzer.languages;
        }
        if other.analyzer.args != analyzer.args {
            self.analyzer.args = other.analyzer.args;
        }

        let matcher = MatcherConfig::default();
        if other.matcher.workers.is_some() {
            self.matcher.workers = other.matcher.workers;
        }
        if other.matcher.batch_size != matcher.batch_size {
            self.matcher.batch_size = other.matcher.batch_size;
        }
        if other.matcher.strategy != matcher.strategy {
            self.matcher.strategy = other.matcher.strategy;
        }
        if other.matcher.abbrev.is_some() {
            self.matcher.abbrev = other.matcher.abbrev;
        }
        if other.matcher.output != matcher.output {
            self.matcher.output = other.matcher.output;
        }

        let jira = JiraConfig::default();
        if other.jira.url != jira.url {
            self.jira.url = other.jira.url;
        }
        if other.jira.jql != jira.jql {
            self.jira.jql = other.jira.jql;
        }
        if other.jira.page_size != jira.page_size {
            self.jira.page_size = other.jira.page_size;
        }
        if other.jira.max_issues.is_some() {
            self.jira.max_issues = other.jira.max_issues;
        }
        if other.jira.output != jira.output {
            self.jira.output = other.jira.output;
        }
    }

    /// Apply environment variable overrides. Invalid values are ignored
    /// with a warning.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.var(constants::ENV_REPO_PATH) {
            self.repository.path = PathBuf::from(val);
        }
        if let Some(val) = env.var(constants::ENV_REPO_URL) {
            self.repository.url = Some(val);
        }
        if let Some(val) = env.var(constants::ENV_OUTPUT) {
            self.metrics.output = PathBuf::from(val);
        }
        if let Some(val) = env.var(constants::ENV_DATA_DIR) {
            self.metrics.data_dir = PathBuf::from(val);
        }
        if let Some(kind) = env.parsed::<AnalyzerKind>(constants::ENV_ANALYZER) {
            self.analyzer.kind = kind;
        }
        if let Some(val) = env.var(constants::ENV_ANALYZER_PROGRAM) {
            self.analyzer.program = Some(val);
        }
        match env.parsed::<usize>(constants::ENV_WORKERS) {
            Some(0) => tracing::warn!("ignoring invalid {} value: 0", constants::ENV_WORKERS),
            Some(workers) => self.matcher.workers = Some(workers),
            None => {}
        }
        if let Some(val) = env.var(constants::ENV_JIRA_URL) {
            self.jira.url = val;
        }
        if let Some(val) = env.var(constants::ENV_JIRA_JQL) {
            self.jira.jql = val;
        }
    }
}
