//! Serve loop: bind, drop privileges, accept, and react to control signals.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use mizuno_config::ServiceOptions;

use crate::SERVER_TARGET;
use crate::application::Application;
use crate::errors::ServerError;
use crate::privilege::{Identity, SystemIdentity, drop_privileges};
use crate::signals::{ControlEvent, ControlSignals, SystemSignals};
use crate::site::Site;
use crate::transport::{HttpHandler, HttpListener};

/// Runs the service in the current process until a shutdown signal arrives.
///
/// Signal handlers are installed first so a reload request that races the
/// startup is not fatal; the working directory then moves to the service
/// root.
///
/// # Errors
///
/// Returns an error when signal handlers cannot be installed, the root cannot
/// be entered, the address cannot be bound, or privileges cannot be dropped.
pub fn run(options: &ServiceOptions) -> Result<(), ServerError> {
    let signals = SystemSignals::install()?;
    env::set_current_dir(options.root()).map_err(|source| ServerError::Root {
        path: options.root().to_path_buf(),
        source,
    })?;
    run_with(options, &SystemIdentity, signals, |_| {})
}

/// Serves with explicit identity and signal seams.
///
/// `on_ready` receives the bound address once the listener accepts
/// connections.
///
/// # Errors
///
/// Returns an error when the address cannot be bound, privileges cannot be
/// dropped, or the accept loop fails.
pub fn run_with<I, S, F>(
    options: &ServiceOptions,
    identity: &I,
    mut signals: S,
    on_ready: F,
) -> Result<(), ServerError>
where
    I: Identity,
    S: ControlSignals,
    F: FnOnce(SocketAddr),
{
    let application = Arc::new(Application::load(options.target_path()));
    let listener = HttpListener::bind(options.host(), options.port())?;
    let addr = listener.local_addr();
    let privileges = drop_privileges(options, identity)?;

    let site = Site::new(
        Arc::clone(&application),
        options.public().map(ToOwned::to_owned),
    );
    let handle = listener.start(Arc::new(HttpHandler::new(site)), privileges)?;
    info!(
        target: SERVER_TARGET,
        %addr,
        pid = std::process::id(),
        target_path = %application.path(),
        "service ready"
    );
    on_ready(addr);

    while let Some(event) = signals.next_event() {
        match event {
            ControlEvent::Reload => application.reload(),
            ControlEvent::Shutdown { signal } => {
                info!(target: SERVER_TARGET, signal, "shutting down");
                break;
            }
        }
    }

    handle.shutdown();
    handle.join()?;
    Ok(())
}
