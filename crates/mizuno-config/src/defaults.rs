use std::time::Duration;

use crate::logging::LogFormat;

/// Host probed and bound when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port probed and bound when none is configured.
pub const DEFAULT_PORT: u16 = 9292;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Application target served at `/` when none is given on the command line.
pub const DEFAULT_TARGET: &str = "index.html";

/// Cumulative budget granted to each liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
