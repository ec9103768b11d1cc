//! Shared configuration for the `mizuno` control plane.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or `MIZUNO_CONFIG_PATH`), then
//! `MIZUNO_*` environment variables, then command-line flags. Every field is
//! optional so that a partially specified layer never masks a lower one. The
//! defaults layer always carries the network and logging defaults, so a merge
//! with no other sources still yields a complete [`Config`].

mod defaults;
mod logging;
mod options;
mod paths;

pub use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_PROBE_TIMEOUT, DEFAULT_TARGET,
    default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use options::{LaunchArgument, ServiceOptions, ServiceOptionsError};
pub use paths::{resolve_optional_path, resolve_path};

/// Layered configuration for the service and its controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MIZUNO")]
pub struct Config {
    /// Host the service binds and the liveness probe connects to.
    #[ortho_config(default = String::from(DEFAULT_HOST))]
    pub host: Option<String>,
    /// Port the service binds and the liveness probe connects to.
    #[ortho_config(default = DEFAULT_PORT)]
    pub port: Option<u16>,
    /// File recording the pid of the daemonised service.
    pub pidfile: Option<String>,
    /// Directory relative paths are resolved against.
    pub root: Option<String>,
    /// Log file written by the served process.
    pub log: Option<String>,
    /// Directory of static assets served by the service.
    pub public: Option<String>,
    /// User the served process switches to after binding.
    pub user: Option<String>,
    /// Group the served process switches to after binding.
    pub group: Option<String>,
    /// Tracing filter expression, for example `info` or `mizuno=debug`.
    #[ortho_config(default = String::from(DEFAULT_LOG_FILTER))]
    pub log_filter: Option<String>,
    /// Log output format: `compact` or `json`.
    #[ortho_config(default = default_log_format().to_string())]
    pub log_format: Option<String>,
    /// Seconds granted to each liveness probe.
    #[ortho_config(default = DEFAULT_PROBE_TIMEOUT.as_secs())]
    pub probe_timeout: Option<u64>,
}

impl Config {
    /// Host, falling back to [`DEFAULT_HOST`].
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Port, falling back to [`DEFAULT_PORT`].
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Log filter, falling back to [`DEFAULT_LOG_FILTER`].
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Parsed log format, falling back to [`default_log_format`].
    ///
    /// # Errors
    ///
    /// Returns an error when the configured value is not a known format.
    pub fn log_format(&self) -> Result<LogFormat, LogFormatParseError> {
        self.log_format
            .as_deref()
            .map_or_else(|| Ok(default_log_format()), str::parse)
    }
}
