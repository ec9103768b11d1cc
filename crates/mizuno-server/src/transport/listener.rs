//! Listener implementation for the service's TCP endpoint.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::privilege::DroppedPrivileges;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the configured host and port.
///
/// Binding happens before the privilege drop so privileged ports can be
/// served; accepting requires the [`DroppedPrivileges`] token.
#[derive(Debug)]
pub(crate) struct HttpListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl HttpListener {
    pub(crate) fn bind(host: &str, port: u16) -> Result<Self, ListenerError> {
        let listener = bind_tcp(host, port)?;
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self { listener, addr })
    }

    pub(crate) const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        privileges: DroppedPrivileges,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        info!(
            target: LISTENER_TARGET,
            addr = %self.addr,
            user = privileges.user(),
            group = privileges.group(),
            "listener active"
        );
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &HttpListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) {
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                let handler = Arc::clone(handler);
                thread::spawn(move || handler.handle(stream));
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    info!(target: LISTENER_TARGET, addr = %listener.addr, "listener stopped");
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<TcpStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })
}
