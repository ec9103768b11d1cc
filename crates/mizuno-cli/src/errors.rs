//! Error types for the CLI runtime.

use std::sync::Arc;

use thiserror::Error;

use mizuno_config::ServiceOptionsError;
use mizuno_server::{ServerError, TelemetryError};

use crate::lifecycle::LifecycleError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("failed to resolve working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    #[error(transparent)]
    Options(#[from] ServiceOptionsError),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
