//! CLI configuration via environment variables
//!
//! Only logging is configured here; build settings come from
//! `uppb_config::ConfigLoader`.

use std::env;

/// Log filter used when neither `--verbose` nor an environment filter is given
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter used with `--verbose`
pub const VERBOSE_LOG_FILTER: &str = "debug";

/// Environment variables holding a log filter, in precedence order
pub const LOG_FILTER_VARS: &[&str] = &["UPPB_LOG", "RUST_LOG"];

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `tracing` filter directive from UPPB_LOG or RUST_LOG
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            log_filter: LOG_FILTER_VARS
                .iter()
                .filter_map(|var| env::var(var).ok())
                .find(|value| !value.trim().is_empty()),
        }
    }

    /// Filter directive for this run
    pub fn log_filter(&self, verbose: bool) -> &str {
        if verbose {
            VERBOSE_LOG_FILTER
        } else {
            self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
        }
    }
}
