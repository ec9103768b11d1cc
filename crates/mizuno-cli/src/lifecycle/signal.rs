//! Control signal delivery.
//!
//! The command-to-signal mapping is crossed: `stop` sends SIGKILL and `kill`
//! sends SIGTERM. Operators and scripts depend on it.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::info;

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

/// Signals the controller sends to a running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Reload the application (SIGHUP).
    Hangup,
    /// Terminate immediately (SIGKILL).
    Kill,
    /// Request termination (SIGTERM).
    Terminate,
}

impl ControlSignal {
    const fn as_nix(self) -> Signal {
        match self {
            Self::Hangup => Signal::SIGHUP,
            Self::Kill => Signal::SIGKILL,
            Self::Terminate => Signal::SIGTERM,
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_nix().as_str())
    }
}

/// Delivers signals to processes.
pub trait Signaller {
    /// Sends `signal` to `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error when the pid is out of range or delivery fails.
    fn send(&self, pid: u32, signal: ControlSignal) -> Result<(), LifecycleError>;
}

/// Signaller backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignaller;

impl Signaller for SystemSignaller {
    fn send(&self, pid: u32, signal: ControlSignal) -> Result<(), LifecycleError> {
        signal::kill(to_pid(pid)?, signal.as_nix()).map_err(|source| {
            LifecycleError::SignalFailed {
                pid,
                signal,
                source,
            }
        })?;
        info!(target: LIFECYCLE_TARGET, pid, %signal, "signal sent");
        Ok(())
    }
}

/// Reports whether any process with `pid` exists.
///
/// A process owned by another user still counts as alive.
pub(super) fn process_exists(pid: u32) -> Result<bool, LifecycleError> {
    match signal::kill(to_pid(pid)?, None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(LifecycleError::CheckProcess { pid, source }),
    }
}

fn to_pid(pid: u32) -> Result<Pid, LifecycleError> {
    if pid == 0 {
        return Err(LifecycleError::InvalidPid {
            pid,
            reason: "pid 0 addresses the whole process group",
        });
    }
    let raw = i32::try_from(pid).map_err(|_| LifecycleError::InvalidPid {
        pid,
        reason: "exceeds the platform pid range",
    })?;
    Ok(Pid::from_raw(raw))
}
