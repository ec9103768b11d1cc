//! HTTP liveness probing.
//!
//! The same single-request primitive answers two questions with opposite
//! polarity. While waiting for startup, a refused connection means "not yet"
//! and is retried; any HTTP response at all means the service is up. While
//! waiting for shutdown, every response means "still up" and is retried; a
//! refused connection means it is gone. Any other transport failure ends
//! either wait immediately.

use std::error::Error as StdError;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;

/// Fixed back-off between probe attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of a single probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// A complete HTTP exchange happened, whatever the status code.
    Responded,
    /// Nothing is listening.
    Refused,
    /// Any other transport failure.
    Failed(String),
}

/// A liveness probe against the service endpoint.
pub trait Probe {
    /// Issues one `GET /`.
    fn attempt(&self) -> Attempt;

    /// Waits between attempts.
    fn pause(&self, interval: Duration) {
        thread::sleep(interval);
    }

    /// Polls until the service answers; `false` when the budget runs out or
    /// a non-refusal error occurs.
    fn probe_until_up(&self, budget: Duration) -> bool {
        let mut remaining = budget;
        loop {
            match self.attempt() {
                Attempt::Responded => return true,
                Attempt::Refused => {
                    remaining = remaining.saturating_sub(POLL_INTERVAL);
                    if remaining.is_zero() {
                        debug!(target: LIFECYCLE_TARGET, "probe budget exhausted while refused");
                        return false;
                    }
                    self.pause(POLL_INTERVAL);
                }
                Attempt::Failed(reason) => {
                    warn!(target: LIFECYCLE_TARGET, %reason, "liveness probe failed");
                    return false;
                }
            }
        }
    }

    /// Polls until the service stops answering; `false` when it is still
    /// answering once the budget runs out.
    fn probe_until_down(&self, budget: Duration) -> bool {
        let mut remaining = budget;
        while !remaining.is_zero() {
            match self.attempt() {
                Attempt::Responded => {
                    remaining = remaining.saturating_sub(POLL_INTERVAL);
                    self.pause(POLL_INTERVAL);
                }
                Attempt::Refused => return true,
                Attempt::Failed(reason) => {
                    warn!(target: LIFECYCLE_TARGET, %reason, "liveness probe failed; assuming down");
                    return true;
                }
            }
        }
        debug!(target: LIFECYCLE_TARGET, "probe budget exhausted while responding");
        false
    }
}

/// Probe issuing real HTTP requests with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    /// Builds a probe for `http://host:port/`.
    ///
    /// Each request may take at most `request_timeout`. Proxy settings from
    /// the environment are ignored and connections are never pooled.
    ///
    /// # Errors
    ///
    /// Returns an error when the address does not form a valid URL or the
    /// HTTP client cannot be built.
    pub fn new(host: &str, port: u16, request_timeout: Duration) -> Result<Self, LifecycleError> {
        let url = probe_url(host, port)?;
        let client = Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .timeout(request_timeout)
            .build()
            .map_err(|source| LifecycleError::ProbeClient { source })?;
        Ok(Self { client, url })
    }
}

impl Probe for HttpProbe {
    fn attempt(&self) -> Attempt {
        match self.client.get(self.url.clone()).send() {
            Ok(response) => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    url = %self.url,
                    status = response.status().as_u16(),
                    "probe response"
                );
                Attempt::Responded
            }
            Err(error) if is_refused(&error) => Attempt::Refused,
            Err(error) => Attempt::Failed(error.to_string()),
        }
    }
}

/// Forms the probe URL, bracketing IPv6 literals.
///
/// Wildcard bind addresses are probed through the matching loopback address.
pub(crate) fn probe_url(host: &str, port: u16) -> Result<Url, LifecycleError> {
    let authority = match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) if address.is_unspecified() => Ipv4Addr::LOCALHOST.to_string(),
        Ok(IpAddr::V6(address)) if address.is_unspecified() => {
            format!("[{}]", Ipv6Addr::LOCALHOST)
        }
        Ok(IpAddr::V6(address)) => format!("[{address}]"),
        Ok(IpAddr::V4(_)) | Err(_) => host.to_owned(),
    };
    let address = format!("http://{authority}:{port}/");
    Url::parse(&address).map_err(|source| LifecycleError::ProbeAddress { address, source })
}

fn is_refused(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>()
            && io_error.kind() == io::ErrorKind::ConnectionRefused
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpListener};
    use std::time::Instant;

    use rstest::rstest;

    struct Scripted {
        attempts: RefCell<VecDeque<Attempt>>,
        fallback: Attempt,
        made: Cell<usize>,
    }

    impl Scripted {
        fn new(attempts: Vec<Attempt>, fallback: Attempt) -> Self {
            Self {
                attempts: RefCell::new(attempts.into()),
                fallback,
                made: Cell::new(0),
            }
        }
    }

    impl Probe for Scripted {
        fn attempt(&self) -> Attempt {
            self.made.set(self.made.get() + 1);
            self.attempts
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }

        fn pause(&self, _interval: Duration) {}
    }

    const BUDGET: Duration = Duration::from_secs(10);

    #[test]
    fn up_retries_refusals_until_a_response() {
        let probe = Scripted::new(
            vec![Attempt::Refused, Attempt::Refused],
            Attempt::Responded,
        );
        assert!(probe.probe_until_up(BUDGET));
        assert_eq!(probe.made.get(), 3);
    }

    #[test]
    fn up_gives_up_after_the_budget() {
        let probe = Scripted::new(Vec::new(), Attempt::Refused);
        assert!(!probe.probe_until_up(BUDGET));
        assert_eq!(probe.made.get(), 20);
    }

    #[test]
    fn up_does_not_retry_other_failures() {
        let probe = Scripted::new(
            vec![Attempt::Failed(String::from("reset"))],
            Attempt::Responded,
        );
        assert!(!probe.probe_until_up(BUDGET));
        assert_eq!(probe.made.get(), 1);
    }

    #[test]
    fn down_reports_still_up_after_the_budget() {
        let probe = Scripted::new(Vec::new(), Attempt::Responded);
        assert!(!probe.probe_until_down(BUDGET));
        assert_eq!(probe.made.get(), 20);
    }

    #[rstest]
    #[case::refused(Attempt::Refused)]
    #[case::other_failure(Attempt::Failed(String::from("timed out")))]
    fn down_stops_at_the_first_non_response(#[case] last: Attempt) {
        let probe = Scripted::new(vec![Attempt::Responded, last], Attempt::Responded);
        assert!(probe.probe_until_down(BUDGET));
        assert_eq!(probe.made.get(), 2);
    }

    #[rstest]
    #[case::ipv4("127.0.0.1", "http://127.0.0.1:9292/")]
    #[case::hostname("localhost", "http://localhost:9292/")]
    #[case::ipv6("::1", "http://[::1]:9292/")]
    #[case::wildcard_v4("0.0.0.0", "http://127.0.0.1:9292/")]
    #[case::wildcard_v6("::", "http://[::1]:9292/")]
    fn builds_probe_urls(#[case] host: &str, #[case] expected: &str) {
        let url = probe_url(host, 9292).expect("valid url");
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn rejects_hosts_that_cannot_form_a_url() {
        let error = probe_url("bad host", 80).expect_err("spaces are invalid");
        assert!(matches!(error, LifecycleError::ProbeAddress { .. }));
    }

    fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        listener.local_addr().expect("listener address")
    }

    fn responder(reply: &'static [u8]) -> SocketAddr {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let mut reader = BufReader::new(&stream);
                let mut line = String::new();
                while reader.read_line(&mut line).is_ok_and(|read| read > 2) {
                    line.clear();
                }
                let _ = (&stream).write_all(reply);
            }
        });
        addr
    }

    fn http_probe(addr: SocketAddr) -> HttpProbe {
        HttpProbe::new("127.0.0.1", addr.port(), Duration::from_secs(2)).expect("build probe")
    }

    #[test]
    fn never_listening_target_is_unreachable_after_the_budget() {
        let probe = http_probe(closed_port());
        let started = Instant::now();
        assert!(!probe.probe_until_up(Duration::from_secs(1)));
        assert!(started.elapsed() >= POLL_INTERVAL);
        assert_eq!(probe.attempt(), Attempt::Refused);
    }

    #[test]
    fn never_listening_target_is_immediately_down() {
        assert!(http_probe(closed_port()).probe_until_down(Duration::from_secs(1)));
    }

    #[test]
    fn always_listening_target_is_up_whatever_the_status() {
        let addr = responder(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        assert!(http_probe(addr).probe_until_up(Duration::from_secs(1)));
    }

    #[test]
    fn always_listening_target_is_still_up_after_the_budget() {
        let addr = responder(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let started = Instant::now();
        assert!(!http_probe(addr).probe_until_down(Duration::from_secs(1)));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn garbage_responses_end_the_startup_wait_without_retrying() {
        let addr = responder(b"not http at all\r\n\r\n");
        let probe = http_probe(addr);
        let started = Instant::now();
        assert!(!probe.probe_until_up(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
