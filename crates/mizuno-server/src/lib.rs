//! The process `mizuno` serves, whether in the foreground or detached.
//!
//! The service is intentionally small: it binds the configured address, drops
//! privileges, and answers HTTP/1.1 requests on a thread per connection. `GET
//! /` returns the application target, other paths come from the optional
//! static asset directory. SIGHUP re-reads the application target; SIGTERM,
//! SIGINT and SIGQUIT stop the accept loop.
//!
//! The controller in `mizuno-cli` only ever observes the service through its
//! pid, OS signals, and the liveness probe against `GET /`.

mod application;
mod errors;
mod privilege;
mod service;
mod signals;
mod site;
pub mod telemetry;
mod transport;

pub use application::Application;
pub use errors::ServerError;
pub use privilege::{DroppedPrivileges, Identity, PrivilegeError, SystemIdentity, drop_privileges};
pub use service::{run, run_with};
pub use signals::{ControlEvent, ControlSignals, SignalError, SystemSignals};
pub use site::Site;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

const SERVER_TARGET: &str = "mizuno::server";
