// src/connection/handler.rs

//! Defines the `ConnectionHandler` which drives a single client socket and
//! reports its activity to the lifecycle event loop.
//!
//! The protocol is a line echo: each newline-terminated request line
//! is echoed back. What matters here is that every completed read and every
//! completed write is reported, so the reaper sees the connection as active.

use super::ConnectionId;
use super::guard::ConnectionGuard;
use crate::config::Adjustments;
use crate::core::ReaperError;
use crate::core::events::{ConnectionEvent, EventSender};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Manages the I/O side of a client connection.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, LinesCodec>,
    addr: SocketAddr,
    id: ConnectionId,
    events: EventSender,
    kill_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    outbuf_overflow: usize,
    log_socket_errors: bool,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler`.
    ///
    /// `kill_rx` is the receiving side of the connection's `KillSwitch`; it
    /// fires when the connection is reaped or explicitly shut down.
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        id: ConnectionId,
        events: EventSender,
        kill_rx: broadcast::Receiver<()>,
        global_shutdown_rx: broadcast::Receiver<()>,
        adjustments: &Adjustments,
    ) -> Self {
        let codec = LinesCodec::new_with_max_length(adjustments.inbuf_overflow);
        let mut framed = Framed::with_capacity(socket, codec, adjustments.recv_bytes);
        // Only `outbuf_overflow` forces a flush between pipelined replies.
        framed.set_backpressure_boundary(adjustments.outbuf_overflow);
        Self {
            framed,
            addr,
            id,
            events,
            kill_rx,
            global_shutdown_rx,
            outbuf_overflow: adjustments.outbuf_overflow,
            log_socket_errors: adjustments.log_socket_errors,
        }
    }

    pub fn log_socket_errors(&self) -> bool {
        self.log_socket_errors
    }

    /// The main event loop for the connection. Returns once the peer hangs
    /// up, the connection is killed, or the server shuts down.
    pub async fn run(&mut self) -> Result<(), ReaperError> {
        let _guard = ConnectionGuard::new(self.events.clone(), self.id, self.addr);
        loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    info!("Connection handler for {} received GLOBAL shutdown signal.", self.addr);
                    break;
                }
                _ = self.kill_rx.recv() => {
                    info!("Connection handler for {} received kill signal.", self.addr);
                    break;
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(line)) => {
                            debug!("Connection {}: read {} byte line.", self.id, line.len());
                            self.report(ConnectionEvent::Read(self.id));
                            // A peer that stops reading parks the reply here,
                            // so the write must still yield to a kill.
                            tokio::select! {
                                biased;
                                _ = self.global_shutdown_rx.recv() => {
                                    info!("Connection handler for {} received GLOBAL shutdown signal while writing.", self.addr);
                                    break;
                                }
                                _ = self.kill_rx.recv() => {
                                    info!("Connection handler for {} received kill signal while writing.", self.addr);
                                    break;
                                }
                                res = send_reply(&mut self.framed, line, self.outbuf_overflow) => {
                                    match res.map_err(into_reaper_error) {
                                        Ok(true) => self.report(ConnectionEvent::Write(self.id)),
                                        Ok(false) => {}
                                        Err(e) if is_normal_disconnect(&e) => {
                                            debug!("Connection from {} closed by peer while writing: {}", self.addr, e);
                                            break;
                                        }
                                        Err(e) => return Err(e),
                                    }
                                }
                            }
                        }
                        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                            warn!("Connection {} from {} exceeded the request line limit; closing.", self.id, self.addr);
                            break;
                        }
                        Some(Err(LinesCodecError::Io(e))) => {
                            let e = ReaperError::from(e);
                            if is_normal_disconnect(&e) {
                                debug!("Connection from {} closed by peer: {}", self.addr, e);
                                break;
                            }
                            return Err(e);
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn report(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event loop is gone; dropping {:?}.", event);
        }
    }
}

/// Queues one reply and flushes unless another complete request line is
/// already waiting and the output buffer is still under `outbuf_overflow`.
/// Returns whether a flush happened.
async fn send_reply(
    framed: &mut Framed<TcpStream, LinesCodec>,
    line: String,
    outbuf_overflow: usize,
) -> Result<bool, LinesCodecError> {
    framed.feed(line).await?;
    let flush = framed.write_buffer().len() >= outbuf_overflow
        || !framed.read_buffer().contains(&b'\n');
    if flush {
        SinkExt::<String>::flush(framed).await?;
    }
    Ok(flush)
}

fn into_reaper_error(e: LinesCodecError) -> ReaperError {
    match e {
        LinesCodecError::Io(io) => ReaperError::from(io),
        other => ReaperError::from(std::io::Error::new(std::io::ErrorKind::InvalidData, other)),
    }
}

fn is_normal_disconnect(e: &ReaperError) -> bool {
    matches!(e, ReaperError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
