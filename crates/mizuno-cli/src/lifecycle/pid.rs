//! PID file handling.
//!
//! The pid file is the only record of a running daemon. Readers reconcile it
//! against the process table and delete it when it no longer names a live
//! service process.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;

use camino::Utf8Path;
use mizuno_config::ServiceOptions;
use tempfile::Builder;
use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use super::process_table::ProcessTable;

/// Reads and maintains the pid file at a fixed path.
pub(crate) struct PidRegistry<'a, T: ProcessTable> {
    path: &'a Utf8Path,
    table: &'a T,
}

impl<'a, T: ProcessTable> PidRegistry<'a, T> {
    pub(crate) const fn new(path: &'a Utf8Path, table: &'a T) -> Self {
        Self { path, table }
    }

    /// Builds a registry for the configured pid file.
    pub(crate) fn from_options(
        options: &'a ServiceOptions,
        table: &'a T,
    ) -> Result<Self, LifecycleError> {
        let path = options.pidfile().ok_or(LifecycleError::MissingPidfile)?;
        Ok(Self::new(path, table))
    }

    pub(crate) const fn path(&self) -> &Utf8Path {
        self.path
    }

    /// Returns the pid of the running service, if any.
    ///
    /// A pid file that cannot be parsed or whose pid is not a live service
    /// process is removed with a warning.
    pub(crate) fn current_pid(&self) -> Result<Option<u32>, LifecycleError> {
        let contents = match fs::read_to_string(self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LifecycleError::ReadPid {
                    path: self.path.to_path_buf(),
                    source,
                });
            }
        };
        match parse_pid(&contents) {
            Some(pid) if self.table.is_service(pid)? => {
                debug!(target: LIFECYCLE_TARGET, pid, file = %self.path, "pid file is current");
                Ok(Some(pid))
            }
            _ => {
                warn!(target: LIFECYCLE_TARGET, "removing stale pidfile '{}'", self.path);
                self.remove()?;
                Ok(None)
            }
        }
    }

    /// Records `pid`, refusing to replace a pid file another writer created.
    pub(crate) fn write(&self, pid: u32) -> Result<(), LifecycleError> {
        let write_error = |source| LifecycleError::WritePid {
            path: self.path.to_path_buf(),
            source,
        };
        let directory = self.path.parent().ok_or_else(|| {
            write_error(io::Error::new(
                io::ErrorKind::NotFound,
                "pid file path has no parent directory",
            ))
        })?;
        let mut file = Builder::new()
            .prefix(self.path.file_name().unwrap_or("mizuno.pid"))
            .suffix(".tmp")
            .permissions(Permissions::from_mode(0o600))
            .tempfile_in(directory)
            .map_err(write_error)?;
        writeln!(file, "{pid}").map_err(write_error)?;
        file.as_file().sync_all().map_err(write_error)?;
        match file.persist_noclobber(self.path) {
            Ok(_) => {
                debug!(target: LIFECYCLE_TARGET, pid, file = %self.path, "pid file written");
                Ok(())
            }
            Err(error) if error.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(LifecycleError::PidfileClobbered {
                    path: self.path.to_path_buf(),
                })
            }
            Err(error) => Err(write_error(error.error)),
        }
    }

    /// Deletes the pid file; a file that is already gone is not an error.
    pub(crate) fn remove(&self) -> Result<(), LifecycleError> {
        match fs::remove_file(self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LifecycleError::Cleanup {
                path: self.path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Parses pid file contents; empty, malformed, or zero pids yield `None`.
pub(crate) fn parse_pid(contents: &str) -> Option<u32> {
    contents
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0)
}
