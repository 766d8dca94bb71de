// src/core/registry.rs

//! The authoritative set of live connections plus the shared sweep clock.

use crate::connection::{Connection, ConnectionId, ConnectionInfo};
use crate::core::ReaperError;
use crate::core::clock::Timestamp;
use indexmap::IndexMap;
use std::time::Duration;

/// Every connection that is currently open, keyed by id.
///
/// A connection is present exactly while it is connected: removal and closing
/// always happen together. The registry also owns `last_sweep`, the one sweep
/// schedule for the whole server. Nothing per-connection feeds into it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: IndexMap<ConnectionId, Connection>,
    last_sweep: Timestamp,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose sweep clock sits at the clock origin.
    pub fn new() -> Self {
        Self {
            connections: IndexMap::new(),
            last_sweep: Timestamp::ZERO,
        }
    }

    /// Adds a newly accepted connection.
    ///
    /// Fails with `DuplicateId` if the id is still registered. The rejected
    /// connection is dropped without touching its resource, which belongs to
    /// whoever issued the duplicate accept.
    pub fn register(&mut self, connection: Connection) -> Result<(), ReaperError> {
        let id = connection.id();
        if self.connections.contains_key(&id) {
            return Err(ReaperError::DuplicateId(id));
        }
        self.connections.insert(id, connection);
        Ok(())
    }

    /// Removes a connection and hands it back so the caller can close it.
    /// Unknown ids are a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&id)
    }

    /// Returns an independent, insertion-ordered copy of the registered
    /// connections. Later registry changes do not affect it.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.connections.values().map(Connection::info).collect()
    }

    /// True if at least `sweep_interval` has passed since the last sweep.
    pub fn due_for_sweep(&self, now: Timestamp, sweep_interval: Duration) -> bool {
        now.saturating_duration_since(self.last_sweep) >= sweep_interval
    }

    /// Records that a sweep ran at `now`.
    pub fn record_sweep(&mut self, now: Timestamp) {
        self.last_sweep = now;
    }

    pub fn last_sweep(&self) -> Timestamp {
        self.last_sweep
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Removes every connection, in registration order.
    pub fn drain(&mut self) -> Vec<Connection> {
        self.connections.drain(..).map(|(_, conn)| conn).collect()
    }
}
