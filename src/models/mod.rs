//! Shared types used across all modules.
//!
//! Versions, metric records, issue keys and commit matches live here so
//! that the git, cache, analyzer and output layers can exchange them
//! without reaching into each other's internals.

pub mod issue;
pub mod metrics;
pub mod version;

pub use issue::{CommitMatch, Issue, IssueKey};
pub use metrics::{FileMetrics, MetricSet, MetricsRecord};
pub use version::VersionCommit;
