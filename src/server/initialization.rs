// src/server/initialization.rs

//! Handles server initialization: validating the configuration and binding
//! the listening socket.

use super::context::ServerContext;
use crate::config::{Adjustments, Config};
use anyhow::{Context, Result, anyhow};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    config.validate()?;
    log_startup_info(&config);

    let listener = bind_listener(&config).await?;
    info!(
        "idlereaper server listening on {}",
        listener.local_addr().context("Listener has no local address")?
    );

    Ok(ServerContext::new(config, listener))
}

/// Binds the listener with the socket options from `Adjustments`.
async fn bind_listener(config: &Config) -> Result<TcpListener> {
    let addr: SocketAddr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", config.host, config.port))?
        .next()
        .ok_or_else(|| anyhow!("No address found for {}:{}", config.host, config.port))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    apply_buffer_sizes(&socket, &config.adjustments);
    socket
        .bind(addr)
        .with_context(|| format!("Failed to bind {addr}"))?;
    let listener = socket.listen(config.adjustments.backlog)?;
    Ok(listener)
}

/// Buffer sizes are hints; the OS may clamp or refuse them.
fn apply_buffer_sizes(socket: &TcpSocket, adj: &Adjustments) {
    let recv = u32::try_from(adj.recv_bytes).unwrap_or(u32::MAX);
    if let Err(e) = socket.set_recv_buffer_size(recv) {
        warn!("Could not set receive buffer size to {}: {}", recv, e);
    }
    let send = u32::try_from(adj.send_bytes).unwrap_or(u32::MAX);
    if let Err(e) = socket.set_send_buffer_size(send) {
        warn!("Could not set send buffer size to {}: {}", send, e);
    }
}

fn log_startup_info(config: &Config) {
    let adj = &config.adjustments;
    info!(
        "Idle timeout {:?}, sweep interval {:?} (worst-case zombie lifetime {:?}).",
        adj.idle_timeout,
        adj.sweep_interval,
        adj.worst_case_zombie_lifetime()
    );
    info!(
        "max_clients={}, backlog={}, recv_bytes={}, send_bytes={}",
        config.max_clients, adj.backlog, adj.recv_bytes, adj.send_bytes
    );
}
