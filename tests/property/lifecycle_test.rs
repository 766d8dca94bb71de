// tests/property/lifecycle_test.rs

//! Property-based tests for connection timing, sweep throttling and
//! sweep completeness

use crate::test_helpers::{FakeSocket, adjustments, at, peer};
use idlereaper::Server;
use idlereaper::connection::{Connection, ConnectionId};
use idlereaper::core::{ConnectionRegistry, Reaper, SweepOutcome};
use proptest::prelude::*;
use std::time::Duration;

const IDLE_SECS: u64 = 300;
const SWEEP_SECS: u64 = 60;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_last_activity_never_decreases(
        created in 0u64..1_000,
        activity in prop::collection::vec(0u64..10_000, 0..50)
    ) {
        let (socket, _) = FakeSocket::new();
        let mut conn = Connection::new(ConnectionId(1), peer(1), socket, at(created));

        let mut previous = conn.last_activity();
        for t in activity {
            conn.mark_activity(at(t));
            prop_assert!(conn.last_activity() >= previous);
            prop_assert!(conn.last_activity() >= conn.creation_time());
            previous = conn.last_activity();
        }
    }

    #[test]
    fn test_recorded_sweeps_are_at_least_one_interval_apart(
        gaps in prop::collection::vec(0u64..120, 1..100)
    ) {
        let adj = adjustments(IDLE_SECS, SWEEP_SECS);
        let mut registry = ConnectionRegistry::new();
        let mut now = 0;
        let mut sweeps = Vec::new();

        for gap in gaps {
            now += gap;
            if Reaper::maybe_sweep(&mut registry, &adj, at(now)).swept() {
                sweeps.push(now);
            }
        }

        for pair in sweeps.windows(2) {
            prop_assert!(pair[1] - pair[0] >= SWEEP_SECS);
        }
    }

    #[test]
    fn test_connection_reaped_iff_idle_at_sweep(
        last_activity in 0u64..1_000,
        quiet_for in 0u64..700
    ) {
        // A sweep is always due at the second accept: nothing swept before it.
        let mut server = Server::new(adjustments(IDLE_SECS, 1));
        let (socket, probe) = FakeSocket::new();
        server.on_accept(ConnectionId(1), peer(1), socket, at(0)).unwrap();
        server.on_write_complete(ConnectionId(1), at(last_activity));

        let sweep_at = (last_activity + quiet_for).max(1);
        let (socket, _) = FakeSocket::new();
        let outcome = server
            .on_accept(ConnectionId(2), peer(2), socket, at(sweep_at))
            .unwrap();
        prop_assert!(outcome.swept());

        let idle = Duration::from_secs(sweep_at - last_activity) >= Duration::from_secs(IDLE_SECS);
        prop_assert_eq!(!server.registry().contains(ConnectionId(1)), idle);
        prop_assert_eq!(probe.count(), usize::from(idle));
    }

    #[test]
    fn test_sweep_closes_exactly_the_idle_connections(
        idle_mask in prop::collection::vec(any::<bool>(), 1..60)
    ) {
        let mut registry = ConnectionRegistry::new();
        let mut probes = Vec::new();
        for (i, &idle) in idle_mask.iter().enumerate() {
            let (socket, probe) = FakeSocket::new();
            let mut conn = Connection::new(ConnectionId(i as u64), peer(1), socket, at(0));
            if !idle {
                conn.mark_activity(at(IDLE_SECS));
            }
            registry.register(conn).unwrap();
            probes.push(probe);
        }

        // Removing entries mid-sweep must neither skip nor revisit any of them.
        let outcome = Reaper::maybe_sweep(
            &mut registry,
            &adjustments(IDLE_SECS, SWEEP_SECS),
            at(IDLE_SECS + 1),
        );
        prop_assert!(outcome.swept());
        if let SweepOutcome::Swept(report) = &outcome {
            prop_assert_eq!(report.examined, idle_mask.len());
            prop_assert_eq!(report.close_failures, 0);
        }

        let expected: Vec<ConnectionId> = idle_mask
            .iter()
            .enumerate()
            .filter(|(_, idle)| **idle)
            .map(|(i, _)| ConnectionId(i as u64))
            .collect();
        prop_assert_eq!(outcome.reaped(), expected.as_slice());

        for (i, (&idle, probe)) in idle_mask.iter().zip(&probes).enumerate() {
            prop_assert_eq!(probe.count(), usize::from(idle));
            prop_assert_eq!(registry.contains(ConnectionId(i as u64)), !idle);
        }
        prop_assert_eq!(registry.len(), idle_mask.len() - expected.len());
    }
}
