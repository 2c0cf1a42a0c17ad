// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread-per-connection TCP frame server.
//!
//! Accepts connections and drives one [`ConnectionHandler`] per
//! connection from a dedicated read thread. This is the whole transport:
//! everything above it (auth, dispatch, broadcast) lives in the daemon.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::transport::{read_message, write_message, ConnectionHandler, MessageConnection};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Builds one handler per accepted connection.
pub type HandlerFactory =
    Arc<dyn Fn(Arc<TcpFrameConnection>) -> Box<dyn ConnectionHandler> + Send + Sync>;

/// A TCP connection carrying length-prefixed frames.
pub struct TcpFrameConnection {
    id: u64,
    peer: SocketAddr,
    writer: Mutex<TcpStream>,
}

impl TcpFrameConnection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            writer: Mutex::new(stream),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl MessageConnection for TcpFrameConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut stream = self.writer.lock();
        write_message(&mut *stream, payload)
    }

    fn close(&self) {
        // Wakes the read thread with EOF; double-close is harmless.
        let _ = self.writer.lock().shutdown(Shutdown::Both);
    }
}

/// Accept loop for the lifecycle protocol.
pub struct FrameServer {
    listener: TcpListener,
}

impl FrameServer {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop on a background thread. Each connection gets
    /// its own read thread and its own handler from `factory`.
    pub fn spawn(self, factory: HandlerFactory) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("warden-accept".to_string())
            .spawn(move || self.run(factory))
    }

    fn run(self, factory: HandlerFactory) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let reader = match stream.try_clone() {
                        Ok(r) => r,
                        Err(e) => {
                            error!(%peer, "failed to clone stream: {}", e);
                            continue;
                        }
                    };
                    let conn = Arc::new(TcpFrameConnection::new(stream, peer));
                    let handler = factory(Arc::clone(&conn));
                    let name = format!("warden-conn-{}", conn.id());
                    if let Err(e) = thread::Builder::new()
                        .name(name)
                        .spawn(move || read_loop(reader, conn, handler))
                    {
                        error!(%peer, "failed to spawn connection thread: {}", e);
                    }
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

fn read_loop(
    mut reader: TcpStream,
    conn: Arc<TcpFrameConnection>,
    mut handler: Box<dyn ConnectionHandler>,
) {
    loop {
        match read_frame(&mut reader) {
            Ok(Some(payload)) => {
                trace!(conn = conn.id(), len = payload.len(), "frame received");
                handler.on_message(&payload);
            }
            Ok(None) => {
                debug!(conn = conn.id(), "peer disconnected");
                handler.on_finished();
                return;
            }
            Err(e) => {
                debug!(conn = conn.id(), "connection failed: {}", e);
                handler.on_failure(e);
                return;
            }
        }
    }
}

fn read_frame(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    match read_message(reader) {
        // A close() from our side surfaces as ConnectionReset/Aborted on
        // some platforms; treat it as a clean finish.
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) =>
        {
            Ok(None)
        }
        other => other,
    }
}
