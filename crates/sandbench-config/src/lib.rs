//! Layered runtime configuration for the sandbench harness.
//!
//! [`Config`] is assembled by `ortho_config` from, in increasing order of
//! precedence, the built-in defaults, an optional configuration file named
//! with `--config-path`, `SANDBENCH_*` environment variables and command-line
//! flags. It only carries ambient settings (logging and the per-invocation
//! timeout); the workloads and enforcement configurations under test live in
//! the session file consumed by `sandbench-harness`.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TIMEOUT_SECS, default_log_filter, default_log_filter_string,
    default_log_format, default_timeout_secs,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime settings shared by every `sandbench` subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SANDBENCH")]
pub struct Config {
    /// `tracing` filter expression, for example `info` or `sandbench_harness=debug`.
    #[serde(default = "default_log_filter_string")]
    log_filter: String,
    /// Output format used by the log subscriber.
    #[serde(default = "default_log_format")]
    log_format: LogFormat,
    /// Wall-clock budget for a single subject invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the per-invocation timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Returns the per-invocation timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Replaces the log filter, keeping the remaining settings.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the per-invocation timeout, keeping the remaining settings.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
