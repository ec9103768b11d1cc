//! Advisory lock serialising state-changing lifecycle commands.
//!
//! The lock is a sibling of the pid file named `<pidfile>.lock` holding the
//! holder's pid. It is written to a temporary file first and moved into place
//! without clobbering, so a lock is never visible without its pid. A lock left
//! behind by a process that no longer exists is reclaimed.

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use super::signal::process_exists;

/// Held lock; released on drop.
#[derive(Debug)]
pub(super) struct LifecycleLock {
    path: Utf8PathBuf,
    _file: File,
}

impl LifecycleLock {
    pub(super) fn acquire(pidfile: &Utf8Path) -> Result<Self, LifecycleError> {
        let path = lock_path(pidfile);
        match create_lock(&path)? {
            Some(file) => Ok(Self::held(path, file)),
            None => {
                reclaim_if_stale(&path)?;
                match create_lock(&path)? {
                    Some(file) => Ok(Self::held(path, file)),
                    None => Err(LifecycleError::LockHeld {
                        pid: read_holder(&path).unwrap_or_default(),
                        path,
                    }),
                }
            }
        }
    }

    fn held(path: Utf8PathBuf, file: File) -> Self {
        debug!(target: LIFECYCLE_TARGET, file = %path, "acquired lifecycle lock");
        Self { path, _file: file }
    }

    #[cfg(test)]
    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for LifecycleLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path)
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: LIFECYCLE_TARGET,
                file = %self.path,
                error = %error,
                "failed to remove lock file"
            );
        }
    }
}

pub(super) fn lock_path(pidfile: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{pidfile}.lock"))
}

/// Creates the lock file, or returns `None` when it already exists.
fn create_lock(path: &Utf8Path) -> Result<Option<File>, LifecycleError> {
    let create_error = |source| LifecycleError::LockCreate {
        path: path.to_path_buf(),
        source,
    };
    let directory = path.parent().ok_or_else(|| {
        create_error(io::Error::new(
            io::ErrorKind::NotFound,
            "lock file path has no parent directory",
        ))
    })?;
    let mut staged = Builder::new()
        .prefix(path.file_name().unwrap_or("mizuno.lock"))
        .suffix(".tmp")
        .permissions(Permissions::from_mode(0o600))
        .tempfile_in(directory)
        .map_err(create_error)?;
    writeln!(staged, "{}", std::process::id()).map_err(create_error)?;
    staged.as_file().sync_all().map_err(create_error)?;
    match staged.persist_noclobber(path) {
        Ok(file) => Ok(Some(file)),
        Err(error) if error.error.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(error) => Err(create_error(error.error)),
    }
}

fn reclaim_if_stale(path: &Utf8Path) -> Result<(), LifecycleError> {
    if let Some(pid) = read_holder(path)
        && process_exists(pid)?
    {
        return Err(LifecycleError::LockHeld {
            path: path.to_path_buf(),
            pid,
        });
    }
    warn!(target: LIFECYCLE_TARGET, file = %path, "reclaiming stale lock file");
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LifecycleError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_holder(path: &Utf8Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0)
}
