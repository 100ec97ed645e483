//! Configuration module for Pagetally
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and selecting jobs from the configured catalogue.
//!
//! # Example
//!
//! ```no_run
//! use pagetally::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("jobs.toml")).unwrap();
//! println!("{} jobs configured", config.jobs.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, JobEntry, NotifyConfig, OutputConfig, Recipient, RunnerConfig, TargetEntry,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{load_config, load_config_with_hash, parse_config};

/// Selector that picks every configured job
pub const SELECT_ALL: &str = "all";

impl Config {
    /// Looks up a job by its exact name
    pub fn job(&self, name: &str) -> Option<&JobEntry> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Selects the jobs named by `selectors`, in configuration order
    ///
    /// A selector matches a job name, a group tag, or `all`. Selectors that
    /// match nothing are logged and skipped.
    pub fn select_jobs(&self, selectors: &[String]) -> Vec<&JobEntry> {
        for selector in selectors {
            if selector != SELECT_ALL && !self.jobs.iter().any(|job| job.matches(selector)) {
                tracing::warn!("No job or group named '{}'", selector);
            }
        }

        self.jobs
            .iter()
            .filter(|job| {
                selectors
                    .iter()
                    .any(|selector| selector == SELECT_ALL || job.matches(selector))
            })
            .collect()
    }
}
