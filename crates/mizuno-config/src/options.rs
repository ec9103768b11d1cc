//! Resolved service options shared by the controller and the served process.
//!
//! [`Config`] mirrors the layered configuration sources verbatim. Before any
//! lifecycle command runs, the CLI turns it into [`ServiceOptions`]: defaults
//! are applied, every filesystem path is made absolute against `root`, and the
//! option set can be rendered back into launch arguments for a detached child.

use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::defaults::{DEFAULT_PROBE_TIMEOUT, DEFAULT_TARGET};
use crate::logging::{LogFormat, LogFormatParseError};
use crate::paths::{resolve_optional_path, resolve_path};
use crate::Config;

/// Fully resolved options for a single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    host: String,
    port: u16,
    root: Utf8PathBuf,
    pidfile: Option<Utf8PathBuf>,
    log: Option<Utf8PathBuf>,
    public: Option<Utf8PathBuf>,
    user: Option<String>,
    group: Option<String>,
    log_filter: String,
    log_format: LogFormat,
    probe_timeout: Duration,
    target: String,
}

impl ServiceOptions {
    /// Resolves configuration into absolute, defaulted options.
    ///
    /// `working_dir` anchors a relative (or absent) `root`; all other paths
    /// are then anchored at the resolved root.
    ///
    /// # Errors
    ///
    /// Returns an error when the working directory is not valid UTF-8 or the
    /// configured log format is unknown.
    pub fn resolve(
        config: &Config,
        target: Option<&str>,
        working_dir: &Path,
    ) -> Result<Self, ServiceOptionsError> {
        let working_dir = Utf8Path::from_path(working_dir).ok_or_else(|| {
            ServiceOptionsError::NonUtf8WorkingDir {
                path: working_dir.display().to_string(),
            }
        })?;
        let root = match config.root.as_deref() {
            Some(root) => resolve_path(working_dir, Utf8Path::new(root)),
            None => working_dir.to_path_buf(),
        };
        let log_format = config
            .log_format()
            .map_err(|source| ServiceOptionsError::LogFormat {
                value: config.log_format.clone().unwrap_or_default(),
                source,
            })?;
        Ok(Self {
            host: config.host().to_owned(),
            port: config.port(),
            pidfile: resolve_optional_path(&root, non_empty(config.pidfile.as_deref())),
            log: resolve_optional_path(&root, non_empty(config.log.as_deref())),
            public: resolve_optional_path(&root, non_empty(config.public.as_deref())),
            user: non_empty(config.user.as_deref()).map(str::to_owned),
            group: non_empty(config.group.as_deref()).map(str::to_owned),
            log_filter: config.log_filter().to_owned(),
            log_format,
            probe_timeout: config
                .probe_timeout
                .map_or(DEFAULT_PROBE_TIMEOUT, Duration::from_secs),
            target: non_empty(target).unwrap_or(DEFAULT_TARGET).to_owned(),
            root,
        })
    }

    /// Host the service binds and the probe connects to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the service binds and the probe connects to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Absolute service root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute pidfile path, when configured.
    pub fn pidfile(&self) -> Option<&Utf8Path> {
        self.pidfile.as_deref()
    }

    /// Absolute log file path, when configured.
    pub fn log(&self) -> Option<&Utf8Path> {
        self.log.as_deref()
    }

    /// Absolute static asset directory, when configured.
    pub fn public(&self) -> Option<&Utf8Path> {
        self.public.as_deref()
    }

    /// User the served process switches to, when configured.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Group the served process switches to, when configured.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Tracing filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Cumulative budget for each liveness probe.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Application target exactly as supplied.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Application target anchored at the service root.
    pub fn target_path(&self) -> Utf8PathBuf {
        resolve_path(&self.root, Utf8Path::new(&self.target))
    }

    /// Overrides the probe budget.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Renders the options as ordered `--name value` pairs for a child launch.
    ///
    /// Unset and empty options are omitted so the child falls back to the
    /// same defaults the parent applied.
    pub fn launch_arguments(&self) -> Vec<LaunchArgument> {
        let candidates = [
            ("host", Some(self.host.clone())),
            ("port", Some(self.port.to_string())),
            ("pidfile", self.pidfile.as_ref().map(ToString::to_string)),
            ("root", Some(self.root.to_string())),
            ("log", self.log.as_ref().map(ToString::to_string)),
            ("public", self.public.as_ref().map(ToString::to_string)),
            ("user", self.user.clone()),
            ("group", self.group.clone()),
            ("log-filter", Some(self.log_filter.clone())),
            ("log-format", Some(self.log_format.to_string())),
            (
                "probe-timeout",
                Some(self.probe_timeout.as_secs().to_string()),
            ),
        ];
        candidates
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .filter(|value| !value.is_empty())
                    .map(|value| LaunchArgument { name, value })
            })
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// A single `--name value` pair forwarded to a detached child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgument {
    name: &'static str,
    value: String,
}

impl LaunchArgument {
    /// Option name without leading dashes.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Rendered option value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Long flag spelling, for example `--pidfile`.
    pub fn flag(&self) -> String {
        format!("--{}", self.name)
    }
}

/// Errors raised while resolving service options.
#[derive(Debug, Error)]
pub enum ServiceOptionsError {
    /// The working directory cannot be represented as UTF-8.
    #[error("working directory '{path}' is not valid UTF-8")]
    NonUtf8WorkingDir { path: String },
    /// The configured log format is not recognised.
    #[error("unknown log format '{value}': {source}")]
    LogFormat {
        value: String,
        #[source]
        source: LogFormatParseError,
    },
}
