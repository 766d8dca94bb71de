// src/server/connection_loop.rs

//! Contains the main server loop: accepting connections, applying connection
//! events, and handling graceful shutdown.
//!
//! The loop is the single owner of the lifecycle `Server`. Accepts, activity
//! reports, and shutdown requests all arrive here and are applied one at a
//! time, which is what lets the core go without locks.

use super::context::ServerContext;
use crate::connection::{ConnectionHandler, ConnectionId, KillSwitch};
use crate::core::Server;
use crate::core::clock::{Clock, MonotonicClock, Timestamp};
use crate::core::events::ConnectionEvent;
use crate::core::metrics;
use crate::core::reaper::SweepOutcome;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The main server loop. Runs until a signal or a shutdown request arrives,
/// or until a fatal lifecycle error occurs.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let clock = MonotonicClock::new();
    let mut server = Server::new(ctx.config.adjustments.clone());
    let mut connection_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();
    let mut stop_rx = ctx.shutdown_tx.subscribe();
    let mut outcome = Ok(());

    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }
            _ = stop_rx.recv() => {
                info!("Shutdown requested, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                let (socket, addr) = match res {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                    warn!("Max clients reached; refusing connection from {}.", addr);
                    metrics::CONNECTIONS_REJECTED_TOTAL.inc();
                    drop(socket);
                    continue;
                };

                // Apply the activity already reported so the sweep sees it.
                // Bounded by the current backlog so a busy sender cannot
                // stall the accept.
                for _ in 0..ctx.events_rx.len() {
                    match ctx.events_rx.try_recv() {
                        Ok(event) => apply_event(&mut server, event, clock.now()),
                        Err(_) => break,
                    }
                }

                connection_id_counter = connection_id_counter.wrapping_add(1);
                let id = ConnectionId(connection_id_counter);
                let (kill_switch, kill_rx) = KillSwitch::pair();

                match server.on_accept(id, addr, Box::new(kill_switch), clock.now()) {
                    Ok(SweepOutcome::Swept(report)) if !report.reaped.is_empty() => {
                        info!("Sweep closed {} zombie connection(s).", report.reaped.len());
                    }
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => {
                        error!("CRITICAL: {}. Shutting down.", e);
                        outcome = Err(e.into());
                        break;
                    }
                    Err(e) => {
                        warn!("Refusing connection from {}: {}", addr, e);
                        continue;
                    }
                }
                info!("Accepted new connection {} from: {}", id, addr);

                let mut handler = ConnectionHandler::new(
                    socket,
                    addr,
                    id,
                    ctx.events_tx.clone(),
                    kill_rx,
                    ctx.shutdown_tx.subscribe(),
                    server.adjustments(),
                );
                client_tasks.spawn(async move {
                    let _permit = permit;
                    if let Err(e) = handler.run().await {
                        if handler.log_socket_errors() {
                            warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                        } else {
                            debug!("Connection from {} terminated unexpectedly: {}", addr, e);
                        }
                    }
                });
            },

            Some(event) = ctx.events_rx.recv() => {
                apply_event(&mut server, event, clock.now());
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Closing all connections.");
    server.shutdown_all();
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No tasks were listening for the shutdown signal.");
    }

    client_tasks.shutdown().await;
    info!("All client connections closed.");

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
    outcome
}

/// Applies one connection event to the lifecycle state.
fn apply_event(server: &mut Server, event: ConnectionEvent, now: Timestamp) {
    let id = event.id();
    match event {
        ConnectionEvent::Read(_) => {
            server.on_read_complete(id, now);
        }
        ConnectionEvent::Write(_) => {
            server.on_write_complete(id, now);
        }
        ConnectionEvent::Closed(_) => {
            if server.on_protocol_closed(id) {
                debug!("Connection {} closed by the protocol layer.", id);
            }
        }
        ConnectionEvent::Shutdown(_) => {
            if server.on_explicit_shutdown(id) {
                info!("Connection {} shut down on request.", id);
            } else {
                debug!("Shutdown requested for unknown connection {}.", id);
            }
        }
    }
}
