// src/core/events.rs

//! Notifications sent from connection tasks to the lifecycle event loop.
//!
//! Connection tasks never touch the registry themselves. They report what
//! happened on their socket and the event loop applies it, so every mutation
//! of lifecycle state happens on one task, in delivery order.

use crate::connection::ConnectionId;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// A lifecycle notification for the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A read completed successfully.
    Read(ConnectionId),
    /// A write (flush to the socket) completed successfully.
    Write(ConnectionId),
    /// The protocol layer finished with the connection or hit an error.
    Closed(ConnectionId),
    /// Someone outside the connection asked for it to be shut down now.
    Shutdown(ConnectionId),
}

impl ConnectionEvent {
    pub fn id(&self) -> ConnectionId {
        match self {
            ConnectionEvent::Read(id)
            | ConnectionEvent::Write(id)
            | ConnectionEvent::Closed(id)
            | ConnectionEvent::Shutdown(id) => *id,
        }
    }
}

/// Creates the channel connecting connection tasks to the event loop.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
