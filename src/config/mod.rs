//! Configuration loading and layering.
//!
//! Handles `.relmine.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{AnalyzerConfig, Config, ConfigError, JiraConfig, MatcherConfig, MetricsConfig, RepositoryConfig};
