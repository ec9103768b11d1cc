//! Connection handling for the HTTP listener.

use std::io::BufReader;
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, warn};

use super::LISTENER_TARGET;
use super::http::{Request, Response, Status, read_request_head};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles accepted connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Produces a response for a parsed request.
pub(crate) trait Responder: Send + Sync + 'static {
    fn respond(&self, request: &Request) -> Response;
}

/// Connection handler speaking one request/response exchange per connection.
#[derive(Debug)]
pub(crate) struct HttpHandler<R> {
    responder: R,
}

impl<R: Responder> HttpHandler<R> {
    pub(crate) const fn new(responder: R) -> Self {
        Self { responder }
    }

    fn exchange(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let Some(line) = read_request_head(BufReader::new(stream))? else {
            return Ok(());
        };
        let response = match Request::parse(&line) {
            Some(request) => {
                let response = self.responder.respond(&request);
                debug!(
                    target: LISTENER_TARGET,
                    method = request.method(),
                    path = request.path(),
                    status = response.status().code(),
                    "request served"
                );
                response
            }
            None => Response::plain(Status::BadRequest),
        };
        response.write_to(stream)
    }
}

impl<R: Responder> ConnectionHandler for HttpHandler<R> {
    fn handle(&self, stream: TcpStream) {
        if let Err(error) = self.exchange(&stream) {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "connection handler error"
            );
        }
    }
}
