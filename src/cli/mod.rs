//! CLI command definitions and terminal summaries.

pub mod args;

use std::io::{IsTerminal, Write};

use colored::Colorize;

use relmine::matcher::MatchSummary;
use relmine::models::VersionCommit;
use relmine::output::ReportSummary;
use relmine::pipeline::RunSummary;

/// Whether to draw live progress on stderr.
///
/// Off with `-v`: debug lines written between redraws would be erased by
/// the line clearing.
pub fn show_progress(no_progress: bool, quiet: bool, verbose: u8) -> bool {
    !no_progress && !quiet && verbose == 0 && std::io::stderr().is_terminal()
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Print resolved versions to stdout, one per line.
pub fn print_versions(versions: &[VersionCommit]) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    for v in versions {
        let _ = writeln!(handle, "{:<12} {}  {}", v.version.to_string(), v.commit, v.tag.dimmed());
    }
}

pub fn print_run_summary(summary: &RunSummary, output: &std::path::Path) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle);
    let _ = writeln!(
        handle,
        "  {} {} version(s): {} computed, {} cached, {}",
        "✔".green().bold(),
        summary.completed(),
        summary.computed,
        summary.cached,
        if summary.failed.is_empty() {
            "0 failed".to_string()
        } else {
            format!("{} failed", summary.failed.len()).red().to_string()
        },
    );
    for version in &summary.failed {
        let _ = writeln!(handle, "    {} {version}", "✖".red());
    }
    let _ = writeln!(
        handle,
        "  {} {} row(s) written to {}",
        "▸".cyan().bold(),
        summary.rows,
        output.display()
    );
}

pub fn print_match_summary(matched: MatchSummary, report: &ReportSummary, output: &std::path::Path) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle);
    let _ = writeln!(
        handle,
        "  {} {} key(s) matched, {} not found",
        "✔".green().bold(),
        matched.found,
        matched.not_found,
    );
    let _ = writeln!(
        handle,
        "  {} {} issue(s) written to {} ({} without commit)",
        "▸".cyan().bold(),
        report.issues,
        output.display(),
        report.without_commit,
    );
}
