//! relmine: release metrics and bug-fix commit mining (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod constants;
pub mod env;
pub mod git;
pub mod issues;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod versions;
