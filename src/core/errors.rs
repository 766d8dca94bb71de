// src/core/errors.rs

//! Defines the primary error type for the connection lifecycle core.

use crate::connection::ConnectionId;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum for the lifecycle core and its runtime.
/// Only `DuplicateId` is fatal; `ResourceClose` is always recovered by the caller.
#[derive(Error, Debug)]
pub enum ReaperError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The I/O layer issued an accept for an id that is still registered.
    #[error("connection id {0} is already registered")]
    DuplicateId(ConnectionId),

    /// Releasing the underlying socket or handle failed.
    #[error("failed to close connection {id}: {source}")]
    ResourceClose {
        id: ConnectionId,
        source: Arc<std::io::Error>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ReaperError {
    /// Wraps an I/O failure from closing the resource of connection `id`.
    pub fn resource_close(id: ConnectionId, e: std::io::Error) -> Self {
        ReaperError::ResourceClose {
            id,
            source: Arc::new(e),
        }
    }

    /// True for errors that must stop the server.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaperError::DuplicateId(_))
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for ReaperError {
    fn clone(&self) -> Self {
        match self {
            ReaperError::Io(e) => ReaperError::Io(Arc::clone(e)),
            ReaperError::DuplicateId(id) => ReaperError::DuplicateId(*id),
            ReaperError::ResourceClose { id, source } => ReaperError::ResourceClose {
                id: *id,
                source: Arc::clone(source),
            },
            ReaperError::Config(s) => ReaperError::Config(s.clone()),
        }
    }
}

impl PartialEq for ReaperError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReaperError::Io(e1), ReaperError::Io(e2)) => e1.to_string() == e2.to_string(),
            (ReaperError::DuplicateId(a), ReaperError::DuplicateId(b)) => a == b,
            (
                ReaperError::ResourceClose { id: a, source: e1 },
                ReaperError::ResourceClose { id: b, source: e2 },
            ) => a == b && e1.kind() == e2.kind(),
            (ReaperError::Config(s1), ReaperError::Config(s2)) => s1 == s2,
            _ => false,
        }
    }
}

impl From<std::io::Error> for ReaperError {
    fn from(e: std::io::Error) -> Self {
        ReaperError::Io(Arc::new(e))
    }
}
