//! Detached service launching.
//!
//! The daemon is this same executable re-run with the resolved options as
//! `--name value` pairs, the `serve` command word, and the application target.
//! It runs in its own process group so terminal signals aimed at the launcher
//! do not reach it.

use std::env;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use mizuno_config::ServiceOptions;
use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

/// Command word the detached child runs.
pub(crate) const SERVE_COMMAND: &str = "serve";

/// A launched child process.
pub trait SpawnedChild {
    fn pid(&self) -> u32;

    /// Kills the child and waits for it so no zombie is left behind.
    fn terminate_and_reap(&mut self);
}

/// Launches the service in the background.
pub trait Spawner {
    /// Starts a detached service for `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when the executable cannot be located or launched.
    fn spawn(&self, options: &ServiceOptions) -> Result<Box<dyn SpawnedChild>, LifecycleError>;
}

/// Spawner that re-executes a `mizuno` binary.
#[derive(Debug, Default, Clone)]
pub struct DetachedSpawner {
    binary: Option<PathBuf>,
}

impl DetachedSpawner {
    /// Re-executes the currently running binary.
    pub const fn new() -> Self {
        Self { binary: None }
    }

    /// Launches `binary` instead of the current executable.
    #[cfg(test)]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn binary(&self) -> Result<PathBuf, LifecycleError> {
        match &self.binary {
            Some(binary) => Ok(binary.clone()),
            None => env::current_exe().map_err(|source| LifecycleError::CurrentExe { source }),
        }
    }
}

impl Spawner for DetachedSpawner {
    fn spawn(&self, options: &ServiceOptions) -> Result<Box<dyn SpawnedChild>, LifecycleError> {
        let binary = self.binary()?;
        let arguments = child_arguments(options);
        debug!(
            target: LIFECYCLE_TARGET,
            binary = %binary.display(),
            ?arguments,
            "launching detached service"
        );
        let child = Command::new(&binary)
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0)
            .spawn()
            .map_err(|source| LifecycleError::Spawn { binary, source })?;
        Ok(Box::new(DetachedChild(child)))
    }
}

/// Argument vector for the detached child.
pub(crate) fn child_arguments(options: &ServiceOptions) -> Vec<OsString> {
    let mut arguments = Vec::new();
    for argument in options.launch_arguments() {
        arguments.push(OsString::from(argument.flag()));
        arguments.push(OsString::from(argument.value()));
    }
    arguments.push(OsString::from(SERVE_COMMAND));
    arguments.push(OsString::from(options.target()));
    arguments
}

struct DetachedChild(Child);

impl SpawnedChild for DetachedChild {
    fn pid(&self) -> u32 {
        self.0.id()
    }

    fn terminate_and_reap(&mut self) {
        if let Err(error) = self.0.kill() {
            debug!(target: LIFECYCLE_TARGET, pid = self.0.id(), %error, "child already gone");
        }
        if let Err(error) = self.0.wait() {
            warn!(target: LIFECYCLE_TARGET, pid = self.0.id(), %error, "failed to reap child");
        }
    }
}
