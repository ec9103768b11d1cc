//! Error types for listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the HTTP listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured host could not be resolved.
    #[error("failed to resolve address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no usable address.
    #[error("no addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the resolved address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound socket did not report its local address.
    #[error("failed to read listener address: {source}")]
    LocalAddr {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
