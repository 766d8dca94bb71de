// src/connection/resource.rs

//! The boundary through which the lifecycle core releases a connection's
//! underlying socket or handle.

use std::io;
use std::net::{Shutdown, TcpStream};
use tokio::sync::broadcast;
use tracing::debug;

/// The I/O layer's close hook for a single connection.
///
/// `Connection::close` calls this at most once. Implementations must report an
/// already-closed resource as success.
pub trait UnderlyingResource: Send {
    fn close(&mut self) -> io::Result<()>;
}

/// Stops a connection task spawned by the runtime.
///
/// Each connection task listens on the receiving side of this channel and
/// drops its socket when signalled.
#[derive(Debug)]
pub struct KillSwitch {
    tx: broadcast::Sender<()>,
}

impl KillSwitch {
    pub fn new(tx: broadcast::Sender<()>) -> Self {
        Self { tx }
    }

    /// Creates a switch together with the receiver the connection task waits on.
    pub fn pair() -> (Self, broadcast::Receiver<()>) {
        let (tx, rx) = broadcast::channel(1);
        (Self::new(tx), rx)
    }
}

impl UnderlyingResource for KillSwitch {
    fn close(&mut self) -> io::Result<()> {
        if self.tx.send(()).is_err() {
            // The task already exited and dropped its socket.
            debug!("Kill signal had no receiver; connection task already finished.");
        }
        Ok(())
    }
}

/// Owns a blocking `TcpStream` and shuts it down on close.
///
/// This is the adapter for event loops that drive std sockets directly. The
/// tokio runtime in `server` registers a `KillSwitch` instead, because the
/// socket there belongs to the connection task.
#[derive(Debug)]
pub struct SocketResource {
    stream: TcpStream,
}

impl SocketResource {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl UnderlyingResource for SocketResource {
    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}
