// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard that reports a finished connection
//! task to the lifecycle event loop.

use super::ConnectionId;
use crate::core::events::{ConnectionEvent, EventSender};
use std::net::SocketAddr;
use tracing::debug;

/// Sends `ConnectionEvent::Closed` when the connection task exits, however it
/// exits (peer hangup, protocol error, kill signal, or panic unwinding).
pub struct ConnectionGuard {
    events: EventSender,
    id: ConnectionId,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(events: EventSender, id: ConnectionId, addr: SocketAddr) -> Self {
        Self { events, id, addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "ConnectionGuard dropping, reporting connection {} from {} as closed.",
            self.id, self.addr
        );
        // After a reap the registry no longer knows this id and the event is a
        // no-op. A send error means the event loop has already shut down.
        if self.events.send(ConnectionEvent::Closed(self.id)).is_err() {
            debug!(
                "Event loop is gone; close of connection {} not reported.",
                self.id
            );
        }
    }
}
