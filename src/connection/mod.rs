// src/connection/mod.rs

//! Per-connection state and the task that drives a single client socket.

mod guard;
mod handler;
mod resource;
mod state;

// Publicly re-export the primary types from the sub-modules.
pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use resource::{KillSwitch, SocketResource, UnderlyingResource};
pub use state::{Connection, ConnectionId, ConnectionInfo};
