// src/connection/state.rs

//! Defines the per-connection timing state and its narrow mutation surface.

use super::resource::UnderlyingResource;
use crate::core::ReaperError;
use crate::core::clock::Timestamp;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// The identifier the I/O layer assigns to a connection at accept time.
/// It is stable for the lifetime of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A point-in-time copy of a connection's identity and timing state.
///
/// This is what `ConnectionRegistry::snapshot` hands out: it owns no resource
/// and does not change when the registry does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub creation_time: Timestamp,
    pub last_activity: Timestamp,
    pub connected: bool,
}

impl ConnectionInfo {
    /// True if no activity has been seen for at least `idle_timeout`.
    /// The boundary is inclusive.
    pub fn is_idle_at(&self, now: Timestamp, idle_timeout: Duration) -> bool {
        self.idle_for(now) >= idle_timeout
    }

    /// How long the connection has gone without activity as of `now`.
    pub fn idle_for(&self, now: Timestamp) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// A single tracked connection.
///
/// The state machine is `Active -> Closed`: `connected` starts out true and
/// `close` flips it exactly once.
pub struct Connection {
    info: ConnectionInfo,
    resource: Box<dyn UnderlyingResource>,
}

impl Connection {
    /// Creates an active connection first seen at `now`.
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        resource: Box<dyn UnderlyingResource>,
        now: Timestamp,
    ) -> Self {
        Self {
            info: ConnectionInfo {
                id,
                peer_addr,
                creation_time: now,
                last_activity: now,
                connected: true,
            },
            resource,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.info.peer_addr
    }

    pub fn creation_time(&self) -> Timestamp {
        self.info.creation_time
    }

    pub fn last_activity(&self) -> Timestamp {
        self.info.last_activity
    }

    pub fn is_connected(&self) -> bool {
        self.info.connected
    }

    /// Returns a detached copy of the timing state.
    pub fn info(&self) -> ConnectionInfo {
        self.info.clone()
    }

    /// Records a completed read or write at `now`.
    ///
    /// Must be called for both directions. A connection that only ever writes
    /// (a long streaming response, for instance) is otherwise indistinguishable
    /// from a zombie. A `now` older than the recorded activity is ignored.
    pub fn mark_activity(&mut self, now: Timestamp) {
        if now > self.info.last_activity {
            self.info.last_activity = now;
        }
    }

    pub fn is_idle_at(&self, now: Timestamp, idle_timeout: Duration) -> bool {
        self.info.is_idle_at(now, idle_timeout)
    }

    pub fn idle_for(&self, now: Timestamp) -> Duration {
        self.info.idle_for(now)
    }

    /// Marks the connection closed and releases its resource.
    ///
    /// Calling this on an already-closed connection does nothing. If the
    /// resource fails to close, the connection still counts as closed and the
    /// failure is returned for the caller to log.
    pub fn close(&mut self) -> Result<(), ReaperError> {
        if !self.info.connected {
            return Ok(());
        }
        self.info.connected = false;
        self.resource
            .close()
            .map_err(|e| ReaperError::resource_close(self.info.id, e))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
