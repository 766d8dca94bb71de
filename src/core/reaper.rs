// src/core/reaper.rs

//! The zombie sweep: finds connections idle past `idle_timeout` and closes them.
//!
//! Sweeps are not driven by a timer. The server asks for one every time it
//! accepts a connection, and `maybe_sweep` throttles those requests to at most
//! one per `sweep_interval`. Under load this is frequent enough to keep the
//! zombie population bounded.
//!
//! Known limitation: a server that stops receiving new connections also stops
//! sweeping, so zombies already open stay open until the next accept.

use crate::config::Adjustments;
use crate::connection::ConnectionId;
use crate::core::clock::Timestamp;
use crate::core::metrics;
use crate::core::registry::ConnectionRegistry;
use tracing::{debug, info, warn};

/// What a single `maybe_sweep` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The last sweep was less than `sweep_interval` ago; nothing was examined.
    Throttled,
    /// A sweep ran.
    Swept(SweepReport),
}

impl SweepOutcome {
    pub fn swept(&self) -> bool {
        matches!(self, SweepOutcome::Swept(_))
    }

    /// The ids closed by this call, empty when throttled.
    pub fn reaped(&self) -> &[ConnectionId] {
        match self {
            SweepOutcome::Throttled => &[],
            SweepOutcome::Swept(report) => &report.reaped,
        }
    }
}

/// The result of one sweep over the registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// The sweep time, as recorded in the registry.
    pub at: Timestamp,
    /// How many connections the snapshot held.
    pub examined: usize,
    /// Connections closed as zombies, in snapshot order.
    pub reaped: Vec<ConnectionId>,
    /// How many of those failed to release their resource.
    pub close_failures: usize,
}

pub struct Reaper;

impl Reaper {
    /// Runs a sweep at `now` if one is due.
    ///
    /// The sweep iterates a snapshot, so removing connections from the
    /// registry while it runs cannot skip or revisit entries. A connection
    /// whose resource fails to close is still unregistered, and the sweep
    /// carries on with the rest.
    pub fn maybe_sweep(
        registry: &mut ConnectionRegistry,
        adjustments: &Adjustments,
        now: Timestamp,
    ) -> SweepOutcome {
        if !registry.due_for_sweep(now, adjustments.sweep_interval) {
            return SweepOutcome::Throttled;
        }

        let snapshot = registry.snapshot();
        let mut report = SweepReport {
            at: now,
            examined: snapshot.len(),
            reaped: Vec::new(),
            close_failures: 0,
        };

        for info in snapshot
            .iter()
            .filter(|c| c.connected && c.is_idle_at(now, adjustments.idle_timeout))
        {
            let Some(mut conn) = registry.unregister(info.id) else {
                continue;
            };
            info!(
                "Closing zombie connection {} from {} (idle for {:?}).",
                info.id,
                info.peer_addr,
                info.idle_for(now)
            );
            if let Err(e) = conn.close() {
                warn!("Zombie connection {} did not close cleanly: {}", info.id, e);
                metrics::CLOSE_FAILURES_TOTAL.inc();
                report.close_failures += 1;
            }
            report.reaped.push(info.id);
        }

        registry.record_sweep(now);

        metrics::SWEEPS_TOTAL.inc();
        metrics::ZOMBIES_REAPED_TOTAL.inc_by(report.reaped.len() as f64);
        debug!(
            "Sweep at {} examined {} connection(s), reaped {}.",
            now,
            report.examined,
            report.reaped.len()
        );

        SweepOutcome::Swept(report)
    }
}
