//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

use relmine::matcher::MatchStrategy;

/// Mine release metrics and bug-fix commits from a repository's history.
#[derive(Parser, Debug)]
#[command(name = "relmine", version = relmine::constants::VERSION)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Read configuration from this file (on top of the global and local ones).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List release versions resolved from tags, oldest first.
    Versions(RepoArgs),

    /// Extract metrics for every release version.
    Metrics(MetricsArgs),

    /// Query the issue tracker and save the issue list.
    Issues(IssuesArgs),

    /// Find the commit that fixed each issue and write the report.
    Match(MatchArgs),

    /// Manage the metrics cache.
    Cache {
        /// Data directory holding the cache.
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print version and build information.
    Version,
}

/// Repository selection shared by several commands.
#[derive(Parser, Debug, Default)]
pub struct RepoArgs {
    /// Path to the repository clone.
    #[arg(long)]
    pub repo: Option<PathBuf>,
}

/// Arguments for the `metrics` subcommand.
#[derive(Parser, Debug)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Output table.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Directory for the cache and analyzer scratch files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Ignore cached results and do not write new ones.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Do not render live progress.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

/// Arguments for the `issues` subcommand.
#[derive(Parser, Debug)]
pub struct IssuesArgs {
    /// Where to save the issue list (JSON).
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// JQL query, replacing the configured one.
    #[arg(long)]
    pub jql: Option<String>,

    /// Stop after this many issues.
    #[arg(long)]
    pub max_issues: Option<usize>,
}

/// Arguments for the `match` subcommand.
#[derive(Parser, Debug)]
pub struct MatchArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Issue list saved by `relmine issues` (or a raw tracker response).
    #[arg(long)]
    pub issues: Option<PathBuf>,

    /// Report file (CSV).
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Concurrent lookups.
    #[arg(long, value_parser = positive)]
    pub workers: Option<usize>,

    /// Keys per batch.
    #[arg(long, value_parser = positive)]
    pub batch_size: Option<usize>,

    /// How commit messages are matched against issue keys.
    #[arg(long)]
    pub strategy: Option<MatchStrategy>,

    /// Shorten commit ids in the report.
    #[arg(long)]
    pub abbrev: Option<usize>,

    /// Do not render live progress.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Remove all cached metrics tables.
    Clear,
    /// Show cache statistics (entry count and size).
    Stats,
    /// Print the cache directory path.
    Path,
}
