// src/core/lifecycle.rs

//! Defines `Server`, which applies accept, activity and shutdown
//! notifications to the registry and triggers sweeps.
//!
//! `Server` is owned by exactly one task. It holds no locks; the single owner
//! is what keeps its mutations ordered.

use crate::config::Adjustments;
use crate::connection::{Connection, ConnectionId, UnderlyingResource};
use crate::core::ReaperError;
use crate::core::clock::Timestamp;
use crate::core::metrics;
use crate::core::reaper::{Reaper, SweepOutcome};
use crate::core::registry::ConnectionRegistry;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Why a connection is being removed outside of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    ExplicitShutdown,
    ProtocolClosed,
    ServerShutdown,
}

pub struct Server {
    registry: ConnectionRegistry,
    adjustments: Adjustments,
}

impl Server {
    pub fn new(adjustments: Adjustments) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            adjustments,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn adjustments(&self) -> &Adjustments {
        &self.adjustments
    }

    /// Registers a freshly accepted connection, then gives the reaper a chance
    /// to sweep.
    ///
    /// A `DuplicateId` error means the I/O layer reused an id that is still
    /// live. It is an integration bug and is returned as-is; no sweep runs.
    pub fn on_accept(
        &mut self,
        id: ConnectionId,
        peer_addr: SocketAddr,
        resource: Box<dyn UnderlyingResource>,
        now: Timestamp,
    ) -> Result<SweepOutcome, ReaperError> {
        self.registry
            .register(Connection::new(id, peer_addr, resource, now))?;
        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
        debug!("Registered connection {} from {} at {}.", id, peer_addr, now);

        let outcome = Reaper::maybe_sweep(&mut self.registry, &self.adjustments, now);
        self.update_gauge();
        Ok(outcome)
    }

    /// Records a completed read. Returns false if the id is not registered,
    /// which happens when a connection was reaped with a read still in flight.
    pub fn on_read_complete(&mut self, id: ConnectionId, now: Timestamp) -> bool {
        self.mark_activity(id, now)
    }

    /// Records a completed write. Returns false if the id is not registered.
    pub fn on_write_complete(&mut self, id: ConnectionId, now: Timestamp) -> bool {
        self.mark_activity(id, now)
    }

    /// Closes a connection on request, regardless of how recently it was
    /// active. Returns false if the id is not registered.
    pub fn on_explicit_shutdown(&mut self, id: ConnectionId) -> bool {
        self.remove(id, Removal::ExplicitShutdown)
    }

    /// The protocol layer is done with the connection, normally or on error.
    /// Returns false if the id is not registered (for example, it was reaped).
    pub fn on_protocol_closed(&mut self, id: ConnectionId) -> bool {
        self.remove(id, Removal::ProtocolClosed)
    }

    /// Closes every registered connection. Returns how many were closed.
    pub fn shutdown_all(&mut self) -> usize {
        let connections = self.registry.drain();
        let count = connections.len();
        for mut conn in connections {
            Self::close_logged(&mut conn, Removal::ServerShutdown);
        }
        self.update_gauge();
        if count > 0 {
            info!("Closed {} open connection(s) on shutdown.", count);
        }
        count
    }

    fn mark_activity(&mut self, id: ConnectionId, now: Timestamp) -> bool {
        match self.registry.get_mut(id) {
            Some(conn) => {
                conn.mark_activity(now);
                true
            }
            None => {
                debug!("Activity for unregistered connection {} ignored.", id);
                false
            }
        }
    }

    fn remove(&mut self, id: ConnectionId, why: Removal) -> bool {
        let Some(mut conn) = self.registry.unregister(id) else {
            return false;
        };
        if why == Removal::ExplicitShutdown {
            metrics::EXPLICIT_SHUTDOWNS_TOTAL.inc();
        }
        Self::close_logged(&mut conn, why);
        self.update_gauge();
        debug!("Connection {} removed ({:?}).", id, why);
        true
    }

    fn close_logged(conn: &mut Connection, why: Removal) {
        if let Err(e) = conn.close() {
            metrics::CLOSE_FAILURES_TOTAL.inc();
            warn!("Ignoring close failure during {:?}: {}", why, e);
        }
    }

    fn update_gauge(&self) {
        metrics::CONNECTED_CLIENTS.set(self.registry.len() as f64);
    }
}
