// src/server/mod.rs

//! The tokio runtime around the lifecycle core: listener setup, the accept and
//! event loop, and background tasks.

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;
pub use initialization::setup;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Validate the configuration and bind the listener.
    let server_context = initialization::setup(config).await?;

    // 2. Spawn background tasks and run the main loop until shutdown.
    serve(server_context).await
}

/// Runs an already set-up server until shutdown.
pub async fn serve(mut server_context: ServerContext) -> Result<()> {
    spawner::spawn_all(&mut server_context);
    connection_loop::run(server_context).await
}
