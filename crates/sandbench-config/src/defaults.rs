//! Built-in defaults applied before any configuration layer is merged.

use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default wall-clock budget, in seconds, granted to one subject invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default per-invocation timeout in seconds.
#[must_use]
pub const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
