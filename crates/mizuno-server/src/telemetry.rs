//! Structured telemetry initialisation shared by the controller and the
//! served process.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};

use mizuno_config::{LogFormat, ServiceOptions};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The configured log file could not be opened for appending.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Configured log file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Events go to `log_file` (appending) when one is given and to stderr
/// otherwise. Lifecycle commands pass `None` so operator output stays on the
/// terminal; the served process passes the configured `--log` path.
///
/// Repeated calls are idempotent: only the first invocation installs the
/// global subscriber.
///
/// # Errors
///
/// Returns an error when the filter expression is invalid, the log file
/// cannot be opened, or another subscriber is already installed.
pub fn initialise(
    options: &ServiceOptions,
    log_file: Option<&Utf8Path>,
) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(options, log_file))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(
    options: &ServiceOptions,
    log_file: Option<&Utf8Path>,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(options.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let (writer, ansi) = match log_file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match options.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn open_log(path: &Utf8Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}
