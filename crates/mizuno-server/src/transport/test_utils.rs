//! Test helpers for the transport module.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::ConnectionHandler;

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Issues `GET path` and returns the raw response.
pub(crate) fn get(addr: SocketAddr, path: &str) -> String {
    let mut client = TcpStream::connect(addr).expect("connect client");
    write!(client, "GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").expect("write request");
    let mut response = String::new();
    client.read_to_string(&mut response).expect("read response");
    response
}
