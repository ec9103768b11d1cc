//! Request routing: the application at `/`, static assets elsewhere.

use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::SERVER_TARGET;
use crate::application::Application;
use crate::transport::{Request, Responder, Response, Status};

/// Routes requests to the application target or the public directory.
#[derive(Debug, Clone)]
pub struct Site {
    application: Arc<Application>,
    public: Option<Utf8PathBuf>,
}

impl Site {
    /// Builds a site over `application`, serving assets from `public` when set.
    pub const fn new(application: Arc<Application>, public: Option<Utf8PathBuf>) -> Self {
        Self {
            application,
            public,
        }
    }

    fn index(&self) -> Response {
        match self.application.content() {
            Some(body) => Response::new(Status::Ok, content_type(self.application.path()), body),
            None => Response::new(
                Status::Ok,
                "text/plain; charset=utf-8",
                format!("mizuno is running; no application at {}\n", self.application.path())
                    .into_bytes(),
            ),
        }
    }

    fn asset(&self, request_path: &str) -> Response {
        let Some(public) = self.public.as_deref() else {
            return Response::plain(Status::NotFound);
        };
        let Some(relative) = confine(request_path) else {
            return Response::plain(Status::Forbidden);
        };
        let path = public.join(relative);
        match fs::read(&path) {
            Ok(body) => Response::new(Status::Ok, content_type(&path), body),
            Err(error) => {
                if error.kind() != io::ErrorKind::NotFound {
                    debug!(target: SERVER_TARGET, path = %path, error = %error, "asset unreadable");
                }
                Response::plain(Status::NotFound)
            }
        }
    }
}

impl Responder for Site {
    fn respond(&self, request: &Request) -> Response {
        if request.method() != "GET" {
            return Response::plain(Status::MethodNotAllowed);
        }
        if request.path() == "/" {
            return self.index();
        }
        self.asset(request.path())
    }
}

/// Turns a request path into a path relative to the public directory.
///
/// Returns `None` for any path that would escape it.
fn confine(request_path: &str) -> Option<Utf8PathBuf> {
    let mut relative = Utf8PathBuf::new();
    for component in Utf8Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Utf8Component::Normal(segment) => relative.push(segment),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return None;
            }
        }
    }
    Some(relative)
}

fn content_type(path: &Utf8Path) -> &'static str {
    match path.extension() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
