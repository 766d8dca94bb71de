// src/core/mod.rs

//! The connection lifecycle core: timing, the registry, the reaper, and the
//! `Server` that ties them to accept and activity notifications.

pub mod clock;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod reaper;
pub mod registry;

pub use clock::{Clock, MonotonicClock, Timestamp};
pub use errors::ReaperError;
pub use lifecycle::Server;
pub use reaper::{Reaper, SweepOutcome, SweepReport};
pub use registry::ConnectionRegistry;
