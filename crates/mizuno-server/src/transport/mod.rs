//! HTTP listener for the served process.
//!
//! The listener binds the configured address and accepts connections on a
//! background thread, handing each one to a [`ConnectionHandler`] on its own
//! thread.

mod errors;
mod handler;
mod http;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, HttpHandler, Responder};
pub(crate) use self::http::{Request, Response, Status};
pub(crate) use self::listener::{HttpListener, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, get};

const LISTENER_TARGET: &str = "mizuno::transport";
