//! Lifecycle command types and output abstractions.
//!
//! Defines the command model, the terminal [`Report`] every command ends
//! with, and the IO wrapper used for progress lines so the controller can
//! remain agnostic of concrete writers.

use std::fmt;
use std::io::Write;
use std::process::ExitCode;

use super::LifecycleError;

/// Supported lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Status,
    Reload,
    Stop,
    Kill,
}

impl LifecycleCommand {
    /// Whether the command changes daemon state and must hold the lock.
    pub const fn mutates_state(self) -> bool {
        !matches!(self, Self::Status)
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => formatter.write_str("start"),
            Self::Status => formatter.write_str("status"),
            Self::Reload => formatter.write_str("reload"),
            Self::Stop => formatter.write_str("stop"),
            Self::Kill => formatter.write_str("kill"),
        }
    }
}

/// Terminal outcome of a lifecycle command: one message and an exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    message: String,
    success: bool,
}

impl Report {
    /// An expected outcome, exit status 0.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    /// A hard failure, exit status 1.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_success(&self) -> bool {
        self.success
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

impl From<&LifecycleError> for Report {
    fn from(error: &LifecycleError) -> Self {
        Self::failure(error.to_string())
    }
}

/// Output handle abstracting over stdout/stderr writers.
pub struct LifecycleOutput<W: Write, E: Write> {
    pub stdout: W,
    pub stderr: E,
}

impl<W: Write, E: Write> LifecycleOutput<W, E> {
    pub const fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stdout.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stdout.flush().map_err(LifecycleError::Io)
    }

    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stderr.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stderr.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stderr.flush().map_err(LifecycleError::Io)
    }

    /// Writes the final report line to stderr and returns its exit status.
    ///
    /// Every command, successful or not, ends here.
    pub fn report(&mut self, report: &Report) -> ExitCode {
        // A broken stderr cannot be reported anywhere else.
        let _ = self.stderr_line(format_args!("{}", report.message()));
        report.exit_code()
    }
}
