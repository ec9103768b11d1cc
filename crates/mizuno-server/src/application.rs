//! The application target served at `/`, reloadable on SIGHUP.

use std::fs;
use std::io;
use std::sync::{PoisonError, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::SERVER_TARGET;

/// Application target loaded from disk.
///
/// A missing target is not an error: the site answers `/` with a banner until
/// the file appears and a reload picks it up.
#[derive(Debug)]
pub struct Application {
    path: Utf8PathBuf,
    content: RwLock<Option<Vec<u8>>>,
}

impl Application {
    /// Reads the target at `path`.
    pub fn load(path: Utf8PathBuf) -> Self {
        let content = match read_target(&path) {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    target: SERVER_TARGET,
                    path = %path,
                    error = %error,
                    "failed to read application target"
                );
                None
            }
        };
        Self {
            path,
            content: RwLock::new(content),
        }
    }

    /// Absolute path of the application target.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Current target contents, or `None` when the file is absent.
    pub fn content(&self) -> Option<Vec<u8>> {
        self.content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the target from disk.
    ///
    /// A read failure other than the file being absent keeps the previously
    /// loaded contents.
    pub fn reload(&self) {
        match read_target(&self.path) {
            Ok(content) => {
                let present = content.is_some();
                *self.content.write().unwrap_or_else(PoisonError::into_inner) = content;
                info!(target: SERVER_TARGET, path = %self.path, present, "application reloaded");
            }
            Err(error) => warn!(
                target: SERVER_TARGET,
                path = %self.path,
                error = %error,
                "reload failed; keeping previous application"
            ),
        }
    }
}

fn read_target(path: &Utf8Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}
