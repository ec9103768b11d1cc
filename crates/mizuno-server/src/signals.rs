//! Control signals delivered to the served process.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use crate::SERVER_TARGET;

/// What the service should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Re-read the application target (SIGHUP).
    Reload,
    /// Stop accepting connections and exit (SIGTERM, SIGINT, SIGQUIT).
    Shutdown {
        /// Raw signal number that requested the shutdown.
        signal: i32,
    },
}

impl ControlEvent {
    /// Maps a raw signal number onto an event.
    pub const fn from_signal(signal: i32) -> Self {
        if signal == SIGHUP {
            Self::Reload
        } else {
            Self::Shutdown { signal }
        }
    }
}

/// Source of control events for the serve loop.
pub trait ControlSignals {
    /// Blocks until the next event; `None` once the source is exhausted.
    fn next_event(&mut self) -> Option<ControlEvent>;
}

/// Errors reported by signal listeners.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Control events fed by `signal-hook`.
///
/// Install this before the service becomes reachable: once registered, a
/// SIGHUP no longer terminates the process with the default disposition.
pub struct SystemSignals {
    signals: Signals,
}

impl SystemSignals {
    /// Registers handlers for SIGHUP, SIGTERM, SIGINT and SIGQUIT.
    ///
    /// # Errors
    ///
    /// Returns an error when the handlers cannot be installed.
    pub fn install() -> Result<Self, SignalError> {
        let signals = Signals::new([SIGHUP, SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| SignalError::Install { source })?;
        Ok(Self { signals })
    }
}

impl ControlSignals for SystemSignals {
    fn next_event(&mut self) -> Option<ControlEvent> {
        let signal = self.signals.forever().next()?;
        info!(target: SERVER_TARGET, signal, "control signal received");
        Some(ControlEvent::from_signal(signal))
    }
}
