//! The slice of HTTP/1.1 the service speaks.
//!
//! Only the request line is interpreted; headers are read and discarded and
//! every response closes the connection.

use std::io::{self, BufRead, Write};

const MAX_HEAD_BYTES: u64 = 16 * 1024;

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    method: String,
    path: String,
}

impl Request {
    /// Parses `METHOD TARGET HTTP/x.y`, dropping any query string.
    pub(crate) fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        let version = parts.next()?;
        if parts.next().is_some() || !version.starts_with("HTTP/") || !target.starts_with('/') {
            return None;
        }
        let path = target.split(['?', '#']).next().unwrap_or(target);
        Some(Self {
            method: method.to_owned(),
            path: path.to_owned(),
        })
    }

    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}

/// Reads the request head and returns its first line.
///
/// Returns `Ok(None)` when the peer closed the connection without sending
/// anything, which is what a bare TCP connect looks like.
pub(crate) fn read_request_head(reader: impl BufRead) -> io::Result<Option<String>> {
    let mut reader = reader.take(MAX_HEAD_BYTES);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }
    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header)?;
        if read == 0 || header.trim_end().is_empty() {
            break;
        }
    }
    Ok(Some(request_line.trim_end().to_owned()))
}

/// Response status codes the service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
}

impl Status {
    pub(crate) const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
        }
    }

    const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

/// A complete response with its body buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Response {
    status: Status,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    pub(crate) const fn new(status: Status, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    /// A plain-text response whose body is the status reason.
    pub(crate) fn plain(status: Status) -> Self {
        Self::new(
            status,
            "text/plain; charset=utf-8",
            format!("{}\n", status.reason()).into_bytes(),
        )
    }

    pub(crate) const fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        let allow = if self.status == Status::MethodNotAllowed {
            "Allow: GET\r\n"
        } else {
            ""
        };
        write!(
            writer,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{allow}Connection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len(),
        )?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::root("GET / HTTP/1.1", "GET", "/")]
    #[case::query("GET /app.css?v=2 HTTP/1.0", "GET", "/app.css")]
    #[case::other_method("POST /submit HTTP/1.1", "POST", "/submit")]
    fn parses_request_lines(#[case] line: &str, #[case] method: &str, #[case] path: &str) {
        let request = Request::parse(line).expect("request should parse");
        assert_eq!(request.method(), method);
        assert_eq!(request.path(), path);
    }

    #[rstest]
    #[case::empty("")]
    #[case::missing_version("GET /")]
    #[case::bad_version("GET / SPDY/3")]
    #[case::absolute_form("GET http://example.com/ HTTP/1.1")]
    #[case::trailing_tokens("GET / HTTP/1.1 extra")]
    fn rejects_malformed_request_lines(#[case] line: &str) {
        assert_eq!(Request::parse(line), None);
    }

    #[test]
    fn reads_request_line_and_skips_headers() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\nignored";
        let line = read_request_head(&raw[..]).expect("read head");
        assert_eq!(line.as_deref(), Some("GET /index.html HTTP/1.1"));
    }

    #[test]
    fn empty_connection_has_no_request() {
        let line = read_request_head(&b""[..]).expect("read head");
        assert_eq!(line, None);
    }

    #[test]
    fn writes_status_headers_and_body() {
        let mut buffer = Vec::new();
        Response::new(Status::Ok, "text/html", b"<p>hi</p>".to_vec())
            .write_to(&mut buffer)
            .expect("write response");
        let text = String::from_utf8(buffer).expect("utf8 response");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.contains("Content-Length: 9\r\n"), "{text}");
        assert!(text.ends_with("\r\n\r\n<p>hi</p>"), "{text}");
    }

    #[test]
    fn method_not_allowed_advertises_get() {
        let mut buffer = Vec::new();
        Response::plain(Status::MethodNotAllowed)
            .write_to(&mut buffer)
            .expect("write response");
        let text = String::from_utf8(buffer).expect("utf8 response");
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{text}");
        assert!(text.contains("Allow: GET\r\n"), "{text}");
    }
}
