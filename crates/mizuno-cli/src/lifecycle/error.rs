//! Error types for daemon lifecycle operations.

use std::io;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

use super::signal::ControlSignal;

/// Errors raised while executing lifecycle commands.
///
/// Every variant is terminal: the CLI reports its message on stderr and exits
/// with status 1.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("specify a --pidfile to daemonize.")]
    MissingPidfile,
    #[error("mizuno is already running (pid {pid}).")]
    AlreadyRunning { pid: u32 },
    #[error("mizuno isn't running.")]
    NotRunning,
    #[error("failed to start mizuno.")]
    StartupFailed { pid: u32 },
    #[error("another mizuno command (pid {pid}) holds {path}; retry when it finishes.")]
    LockHeld { path: Utf8PathBuf, pid: u32 },
    #[error("failed to create lock file {path}: {source}")]
    LockCreate {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read pid file {path}: {source}")]
    ReadPid {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write pid file {path}: {source}")]
    WritePid {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pid file {path} appeared while mizuno was starting; another start won the race.")]
    PidfileClobbered { path: Utf8PathBuf },
    #[error("failed to remove {path}: {source}")]
    Cleanup {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to locate the mizuno executable: {source}")]
    CurrentExe {
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pid {pid} is not a valid process id: {reason}")]
    InvalidPid { pid: u32, reason: &'static str },
    #[error("failed to send {signal} to pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        signal: ControlSignal,
        #[source]
        source: Errno,
    },
    #[error("failed to check whether pid {pid} is alive: {source}")]
    CheckProcess {
        pid: u32,
        #[source]
        source: Errno,
    },
    #[error("failed to list processes: {source}")]
    ProcessTable {
        #[source]
        source: io::Error,
    },
    #[error("invalid probe address {address}: {source}")]
    ProbeAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build the liveness probe client: {source}")]
    ProbeClient {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
}
