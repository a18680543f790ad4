//! Progress reporting for terminal output.
//!
//! A live per-version status list for the metrics pipeline and a
//! single-line counter for the commit matcher. Both render to stderr and
//! are silenced with `--no-progress` or when stderr is not a terminal.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use colored::Colorize;
use indexmap::IndexMap;

/// Status of one version in the metrics pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    CheckingOut,
    Analyzing,
    /// Analyzed and appended.
    Done { rows: usize },
    /// Served from the cache.
    Cached { rows: usize },
    /// Skipped after a recoverable analyzer failure.
    Failed(String),
}

/// Tracks and renders live progress for the versions of a run.
///
/// Shared by reference; all methods take `&self`.
pub struct ProgressTracker {
    inner: Mutex<ProgressState>,
    enabled: bool,
}

struct ProgressState {
    /// version label → status, in processing order.
    steps: IndexMap<String, StepStatus>,
    rendered_lines: usize,
}

impl ProgressTracker {
    pub fn new<I, S>(versions: I, enabled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = versions
            .into_iter()
            .map(|v| (v.into(), StepStatus::Pending))
            .collect();
        Self {
            inner: Mutex::new(ProgressState {
                steps,
                rendered_lines: 0,
            }),
            enabled,
        }
    }

    /// A tracker that records state but never prints.
    pub fn hidden() -> Self {
        Self::new(std::iter::empty::<String>(), false)
    }

    pub fn update(&self, version: &str, status: StepStatus) {
        let mut state = self.lock();
        state.steps.insert(version.to_string(), status);
        if self.enabled {
            Self::render(&mut state);
        }
    }

    pub fn status(&self, version: &str) -> Option<StepStatus> {
        self.lock().steps.get(version).cloned()
    }

    pub fn start(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        Self::render(&mut state);
    }

    /// Clear the live display and print the final status of every version.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        Self::clear_lines(state.rendered_lines);
        state.rendered_lines = 0;

        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for (version, status) in &state.steps {
            if *status == StepStatus::Pending {
                continue;
            }
            let (icon, text) = Self::describe(status);
            let _ = writeln!(handle, "  {icon} {version} {text}");
        }
        let _ = handle.flush();
    }

    fn describe(status: &StepStatus) -> (String, String) {
        match status {
            StepStatus::Pending => ("○".dimmed().to_string(), "waiting".dimmed().to_string()),
            StepStatus::CheckingOut => (
                "◌".cyan().bold().to_string(),
                "checking out…".cyan().to_string(),
            ),
            StepStatus::Analyzing => (
                "◌".cyan().bold().to_string(),
                "analyzing…".cyan().to_string(),
            ),
            StepStatus::Done { rows } => (
                "✔".green().bold().to_string(),
                format!("{rows} file(s)").green().to_string(),
            ),
            StepStatus::Cached { rows } => (
                "✔".green().to_string(),
                format!("{rows} file(s), cached").dimmed().to_string(),
            ),
            StepStatus::Failed(reason) => ("✖".red().bold().to_string(), reason.red().to_string()),
        }
    }

    fn render(state: &mut ProgressState) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        Self::clear_lines(state.rendered_lines);

        let done = state
            .steps
            .values()
            .filter(|s| !matches!(s, StepStatus::Pending | StepStatus::CheckingOut | StepStatus::Analyzing))
            .count();
        let _ = writeln!(
            handle,
            "  {} Extracting metrics for {} version(s) [{done}/{}]",
            "▸".cyan().bold(),
            state.steps.len(),
            state.steps.len(),
        );
        let mut lines = 1;

        for (version, status) in &state.steps {
            let (icon, text) = Self::describe(status);
            let _ = writeln!(handle, "    {icon} {} {text}", version.dimmed());
            lines += 1;
        }

        let _ = handle.flush();
        state.rendered_lines = lines;
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move cursor up and clear `n` lines.
    fn clear_lines(n: usize) {
        if n == 0 {
            return;
        }
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for _ in 0..n {
            let _ = write!(handle, "\x1b[1A\x1b[2K");
        }
        let _ = handle.flush();
    }
}

/// Single-line counter for batched work.
pub struct BatchProgress {
    label: String,
    total: usize,
    /// (completed items, whether a line is on screen)
    state: Mutex<(usize, bool)>,
    enabled: bool,
}

impl BatchProgress {
    pub fn new(label: impl Into<String>, total: usize, enabled: bool) -> Self {
        Self {
            label: label.into(),
            total,
            state: Mutex::new((0, false)),
            enabled,
        }
    }

    pub fn hidden(total: usize) -> Self {
        Self::new("", total, false)
    }

    /// Record `n` more completed items.
    pub fn advance(&self, n: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 = (state.0 + n).min(self.total);
        if self.enabled {
            self.render(state.0, state.1);
            state.1 = true;
        }
    }

    pub fn done(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.1 {
            ProgressTracker::clear_lines(1);
            state.1 = false;
        }
        let done = state.0;
        let _ = writeln!(
            io::stderr(),
            "  {} {} {}/{}",
            "✔".green().bold(),
            self.label,
            done,
            self.total
        );
    }

    fn render(&self, done: usize, replace: bool) {
        if replace {
            ProgressTracker::clear_lines(1);
        }
        const WIDTH: usize = 30;
        let filled = if self.total == 0 { WIDTH } else { done * WIDTH / self.total };
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(WIDTH - filled));
        let _ = writeln!(
            io::stderr(),
            "  {} {} {} {done}/{}",
            "▸".cyan().bold(),
            self.label,
            bar.cyan(),
            self.total
        );
    }
}
