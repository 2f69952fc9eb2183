//! The accepting end of the wire layer.
//!
//! A [`Server`] binds a listening socket, accepts clients on a dedicated
//! thread, and owns the set of live [`Connection`]s. Shutdown is
//! cooperative: an atomic flag is raised and a loopback self-connect nudges
//! the blocking accept awake so the thread can observe it.

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::connection::Connection;
use crate::protocol::Event;
use crate::session::Session;

/// A failure to bring the acceptor up.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("unable to listen on port {port}: {source}")]
    Bind {
        /// The requested port.
        port: u16,
        /// The underlying bind failure.
        source: std::io::Error,
    },
}

/// A listening DAP server. Dropping the last handle tears the acceptor
/// down and closes every connection.
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    session: Session,
    local_addr: SocketAddr,
    shutdown: AtomicBool,
    connections: Mutex<Vec<Connection>>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Bind the listening socket on localhost and start accepting clients.
    /// Pass port 0 to bind an ephemeral port, discoverable afterwards with
    /// [`Server::local_port`].
    pub fn bind(port: u16, session: Session) -> Result<Server, ServerError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .map_err(|source| ServerError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { port, source })?;

        let inner = Arc::new(Inner {
            session,
            local_addr,
            shutdown: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
            accept_thread: Mutex::new(None),
        });

        let accept_inner = inner.clone();
        let handle = thread::spawn(move || accept_loop(listener, accept_inner));
        *inner.accept_thread.lock().unwrap() = Some(handle);

        log::info!("listening for debugger connections on {local_addr}");
        Ok(Server { inner })
    }

    /// The port the acceptor is listening on.
    pub fn local_port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// Send an event to every live connection.
    pub fn broadcast_event<E: Event>(&self, event: &E) {
        let connections = self.inner.connections.lock().unwrap().clone();
        for connection in connections {
            if let Err(e) = connection.send_event(event) {
                log::error!("failed to broadcast event: {e}");
            }
        }
    }

    /// Stop accepting, close every connection, and join all threads.
    /// Idempotent; also runs on drop.
    pub fn end(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        // Nudge the blocking accept awake so it can observe the flag.
        let _ = TcpStream::connect(self.inner.local_addr);
        let handle = self.inner.accept_thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        let connections = std::mem::take(&mut *self.inner.connections.lock().unwrap());
        for connection in connections {
            connection.end();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.end();
    }
}

fn accept_loop(listener: TcpListener, inner: Arc<Inner>) {
    loop {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) => {
                if inner.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                log::error!("accept failed: {e}");
                continue;
            }
        };
        if inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        match Connection::begin(stream, inner.session.clone()) {
            Ok(connection) => {
                inner.connections.lock().unwrap().push(connection);
            }
            Err(e) => log::error!("failed to start connection: {e}"),
        }
    }
}
