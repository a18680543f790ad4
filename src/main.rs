//! relmine: release metrics and bug-fix commit mining.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use relmine::analyzer;
use relmine::cache::MetricsCache;
use relmine::config::Config;
use relmine::constants;
use relmine::env::Env;
use relmine::git::{self, RecoveryGuard, WorkingTree};
use relmine::issues::{self, JiraClient};
use relmine::logging;
use relmine::matcher::{CommitMatcher, MatchError, MatchSummary};
use relmine::models::MetricSet;
use relmine::output::IssueReport;
use relmine::pipeline::{MetricsPipeline, PipelineError};
use relmine::progress::{BatchProgress, ProgressTracker};
use relmine::versions::{self, TagPattern};

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::args::{CacheAction, Cli, Command, IssuesArgs, MatchArgs, MetricsArgs, RepoArgs};

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        let code = if is_interrupt(&err) { EXIT_INTERRUPTED } else { 1 };
        process::exit(code);
    }
}

fn is_interrupt(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Interrupted { .. }))
        || err.downcast_ref::<MatchError>().is_some()
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json, logging::level_from_verbosity(cli.verbose, cli.quiet));

    let cwd = std::env::current_dir().ok();
    let config = Config::load(cli.config.as_deref(), cwd.as_deref(), &Env::real())
        .context("failed to load configuration")?;

    match cli.command {
        Command::Versions(args) => run_versions(args, config).await,
        Command::Metrics(args) => run_metrics(args, config, cli.quiet, cli.verbose).await,
        Command::Issues(args) => run_issues(args, config).await,
        Command::Match(args) => run_match(args, config, cli.quiet, cli.verbose).await,
        Command::Cache { data_dir, action } => run_cache(data_dir, action, config),
        Command::Version => run_version(),
    }
}

/// Print version and build information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!("{} {}", constants::APP_NAME.bold(), constants::VERSION.green().bold());
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

/// Clone the repository if needed and return its root.
async fn open_repo(args: &RepoArgs, config: &Config) -> Result<PathBuf> {
    let path = args.repo.as_deref().unwrap_or(&config.repository.path);
    git::ensure_repo(path, config.repository.url.as_deref())
        .await
        .with_context(|| format!("repository unavailable at {}", path.display()))
}

async fn resolve_versions(repo: &Path, config: &Config) -> Result<Vec<relmine::models::VersionCommit>> {
    let pattern = TagPattern::new(&config.repository.tag_pattern).context("invalid repository.tag_pattern")?;
    let versions = versions::resolve(repo, &pattern)
        .await
        .context("failed to resolve release versions")?;
    Ok(versions)
}

async fn run_versions(args: RepoArgs, config: Config) -> Result<()> {
    let repo = open_repo(&args, &config).await?;
    let versions = resolve_versions(&repo, &config).await?;
    if versions.is_empty() {
        tracing::warn!("no tag matches {}", config.repository.tag_pattern);
    }
    cli::print_versions(&versions);
    Ok(())
}

async fn run_metrics(args: MetricsArgs, mut config: Config, quiet: bool, verbose: u8) -> Result<()> {
    if let Some(output) = args.output {
        config.metrics.output = output;
    }
    if let Some(data_dir) = args.data_dir {
        config.metrics.data_dir = data_dir;
    }

    let metrics = MetricSet::new(config.metrics.names.iter().cloned());
    if metrics.is_empty() {
        bail!("no metrics configured (metrics.names is empty)");
    }
    let analyzer = analyzer::from_config(&config.analyzer)?;

    let repo = open_repo(&args.repo, &config).await?;
    let branch = git::primary_branch(&repo, config.repository.primary_branch.as_deref())
        .await
        .context("failed to determine the primary branch")?;
    let versions = resolve_versions(&repo, &config).await?;
    if versions.is_empty() {
        tracing::warn!("no tag matches {}; nothing to analyze", config.repository.tag_pattern);
    }

    let cache = MetricsCache::new(&config.metrics.data_dir, config.metrics.cache_key, !args.no_cache);
    let pipeline = MetricsPipeline::new(
        WorkingTree::open(&repo).await?,
        cache,
        analyzer,
        metrics,
        config.metrics.data_dir.join("work"),
    );
    let progress = ProgressTracker::new(
        versions.iter().map(|v| v.version.to_string()),
        cli::show_progress(args.no_progress, quiet, verbose),
    );

    tracing::info!("extracting metrics for {} version(s), restoring {branch} afterwards", versions.len());
    let summary = pipeline
        .run(&versions, &config.metrics.output, &branch, &progress, cli::shutdown_signal())
        .await?;

    if !quiet {
        cli::print_run_summary(&summary, &config.metrics.output);
    }
    Ok(())
}

async fn run_issues(args: IssuesArgs, config: Config) -> Result<()> {
    let jira = &config.jira;
    let output = args.output.unwrap_or_else(|| jira.output.clone());
    let jql = args.jql.as_deref().unwrap_or(&jira.jql);

    let client = JiraClient::new(&jira.url)?;
    let found = client
        .search(jql, jira.page_size, args.max_issues.or(jira.max_issues))
        .await
        .context("issue tracker query failed")?;
    issues::save_issues(&output, &found)?;

    println!("{} issue(s) saved to {}", found.len(), output.display());
    Ok(())
}

async fn run_match(args: MatchArgs, config: Config, quiet: bool, verbose: u8) -> Result<()> {
    let issues_path = args.issues.unwrap_or_else(|| config.jira.output.clone());
    let output = args.output.unwrap_or_else(|| config.matcher.output.clone());
    let strategy = args.strategy.unwrap_or(config.matcher.strategy);
    let abbrev = args.abbrev.or(config.matcher.abbrev);

    let issue_list = issues::load_issues(&issues_path)?;
    let keys = issues::issue_keys(&issue_list);
    let repo = open_repo(&args.repo, &config).await?;

    let matcher = CommitMatcher::new(&repo, strategy.matcher())
        .with_workers(args.workers.unwrap_or_else(|| config.matcher.workers()))
        .with_batch_size(args.batch_size.unwrap_or(config.matcher.batch_size));
    let progress = BatchProgress::new(
        "Matching issues",
        keys.len(),
        cli::show_progress(args.no_progress, quiet, verbose),
    );

    let outcome = matcher.run(&keys, &progress, cli::shutdown_signal()).await;
    progress.finish();
    let matches = match outcome {
        Ok(matches) => matches,
        Err(e) => {
            // Matching only reads history, but an interrupted run still
            // leaves the clone on its primary branch.
            let tree = WorkingTree::open(&repo).await?;
            let branch = git::primary_branch(&repo, config.repository.primary_branch.as_deref()).await?;
            if let Err(restore) = RecoveryGuard::new(&tree, branch).restore().await {
                tracing::error!("repository restore failed: {restore}");
            }
            return Err(e.into());
        }
    };

    let report = IssueReport::new(abbrev).write_file(&output, &issue_list, &matches)?;
    if !quiet {
        cli::print_match_summary(MatchSummary::of(&matches), &report, &output);
    }
    Ok(())
}

fn run_cache(data_dir: Option<PathBuf>, action: CacheAction, config: Config) -> Result<()> {
    let data_dir = data_dir.unwrap_or(config.metrics.data_dir);
    let cache = MetricsCache::new(&data_dir, config.metrics.cache_key, true);

    match action {
        CacheAction::Clear => {
            let stats = cache.clear().context("failed to clear cache")?;
            println!(
                "Cleared {} cached entry/entries ({}).",
                stats.entries,
                stats.human_size(),
            );
        }
        CacheAction::Stats => {
            let stats = cache.stats().context("failed to read cache stats")?;
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
        }
        CacheAction::Path => println!("{}", cache.path().display()),
    }

    Ok(())
}
