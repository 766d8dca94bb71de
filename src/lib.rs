// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export
pub use crate::config::Adjustments;
pub use crate::core::{ConnectionRegistry, Reaper, ReaperError, Server};
