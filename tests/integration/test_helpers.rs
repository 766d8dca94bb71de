// tests/integration/test_helpers.rs

//! Test helpers and utilities shared by the unit, property and integration tests

#![allow(dead_code)]

use idlereaper::config::{Adjustments, Config};
use idlereaper::connection::UnderlyingResource;
use idlereaper::core::Timestamp;
use idlereaper::core::events::EventSender;
use idlereaper::server;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Counts how many times a `FakeSocket` was closed.
#[derive(Debug, Clone, Default)]
pub struct CloseProbe {
    closes: Arc<AtomicUsize>,
}

impl CloseProbe {
    pub fn count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// An `UnderlyingResource` that records closes and can be made to fail.
pub struct FakeSocket {
    probe: CloseProbe,
    fail: bool,
}

impl FakeSocket {
    pub fn new() -> (Box<Self>, CloseProbe) {
        let probe = CloseProbe::default();
        let socket = Box::new(Self {
            probe: probe.clone(),
            fail: false,
        });
        (socket, probe)
    }

    /// A socket whose close always reports an OS error.
    pub fn failing() -> (Box<Self>, CloseProbe) {
        let probe = CloseProbe::default();
        let socket = Box::new(Self {
            probe: probe.clone(),
            fail: true,
        });
        (socket, probe)
    }
}

impl UnderlyingResource for FakeSocket {
    fn close(&mut self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(io::Error::other("socket already torn down by the OS"))
        } else {
            Ok(())
        }
    }
}

pub fn peer(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

/// Adjustments with timing in whole seconds.
pub fn adjustments(idle_timeout_secs: u64, sweep_interval_secs: u64) -> Adjustments {
    Adjustments::with_timing(
        Duration::from_secs(idle_timeout_secs),
        Duration::from_secs(sweep_interval_secs),
    )
}

/// A real server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown_tx: broadcast::Sender<()>,
    pub events: EventSender,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Starts a server with the given idle timeout and sweep interval.
    pub async fn start(idle_timeout: Duration, sweep_interval: Duration) -> Self {
        let mut config = Config::default();
        config.adjustments = Adjustments::with_timing(idle_timeout, sweep_interval);
        Self::with_config(config).await
    }

    /// Starts a server with a custom configuration. The port is always
    /// replaced with an ephemeral one.
    pub async fn with_config(mut config: Config) -> Self {
        init_tracing();
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config.metrics.enabled = false;

        let ctx = server::setup(config)
            .await
            .expect("Failed to set up test server");
        let addr = ctx.local_addr().expect("Listener has no address");
        let shutdown_tx = ctx.shutdown_tx.clone();
        let events = ctx.event_sender();
        let handle = tokio::spawn(server::serve(ctx));

        Self {
            addr,
            shutdown_tx,
            events,
            handle,
        }
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to test server")
    }

    /// Stops the server and waits for the main loop to exit.
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("Server did not shut down in time")
            .expect("Server task panicked")
    }
}

/// Sends one line and reads back the echo.
pub async fn echo(stream: &mut TcpStream, line: &str) -> io::Result<String> {
    stream.write_all(format!("{line}\n").as_bytes()).await?;
    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    let n = tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut reply))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no echo received"))??;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before echo",
        ));
    }
    Ok(reply.trim_end_matches('\n').to_string())
}

/// True if the server closes the stream (EOF or reset) within two seconds.
pub async fn is_closed_by_server(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    match tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await {
        Ok(Ok(0)) => true,
        Ok(Ok(_)) => false,
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

fn init_tracing() {
    // Initialize tracing (ignore error if already initialized)
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
