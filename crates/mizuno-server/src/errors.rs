//! Error surface of the served process.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::privilege::PrivilegeError;
use crate::signals::SignalError;
use crate::transport::ListenerError;

/// Errors that stop the service before or while it serves.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The working directory could not be changed to the service root.
    #[error("failed to enter root directory '{path}': {source}")]
    Root {
        /// Configured service root.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Switching user or group failed.
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
    /// Installing signal handlers failed.
    #[error(transparent)]
    Signals(#[from] SignalError),
}
