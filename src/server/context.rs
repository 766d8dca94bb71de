// src/server/context.rs

use crate::config::Config;
use crate::core::events::{self, EventReceiver, EventSender};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub config: Config,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    pub connection_permits: Arc<Semaphore>,
    pub events_tx: EventSender,
    pub events_rx: EventReceiver,
}

impl ServerContext {
    pub fn new(config: Config, listener: TcpListener) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (events_tx, events_rx) = events::channel();
        let connection_permits = Arc::new(Semaphore::new(config.max_clients));
        Self {
            config,
            listener,
            shutdown_tx,
            background_tasks: JoinSet::new(),
            connection_permits,
            events_tx,
            events_rx,
        }
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A sender for injecting events, such as explicit shutdown requests,
    /// into the event loop.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }
}
