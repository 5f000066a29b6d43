//! Per-connection workers.
//!
//! A worker owns one accepted connection, its permit and its registry guard.
//! All three are released when the worker ends, including by panic.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;

use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::idle::IdleTimeoutStream;
use crate::net::listener::ConnectionPermit;
use crate::observability::metrics;
use crate::server::handler::{ConnectionHandler, InboundConnection};

/// Hands accepted connections to new worker tasks.
pub(crate) struct Dispatcher<H> {
    handler: Arc<H>,
    tracker: ConnectionTracker,
    idle_timeout: Duration,
    force_close: watch::Receiver<bool>,
}

impl<H: ConnectionHandler> Dispatcher<H> {
    pub(crate) fn new(
        handler: Arc<H>,
        tracker: ConnectionTracker,
        idle_timeout: Duration,
        force_close: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handler,
            tracker,
            idle_timeout,
            force_close,
        }
    }

    /// Arm the inbound read deadline and spawn a worker for `stream`.
    ///
    /// The connection is registered before the task is spawned so the drain
    /// cannot miss a worker that has not been scheduled yet.
    pub(crate) fn dispatch(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let mut conn = IdleTimeoutStream::from_tcp(stream, self.idle_timeout);
        if !self.idle_timeout.is_zero() {
            conn.set_read_deadline(Instant::now() + self.idle_timeout);
        }

        let span = tracing::debug_span!("connection", id = %guard.id(), peer = %peer);
        let handler = Arc::clone(&self.handler);
        let force_close = self.force_close.clone();
        tokio::spawn(run(handler, conn, permit, guard, force_close).instrument(span));
    }
}

async fn run<H: ConnectionHandler>(
    handler: Arc<H>,
    mut conn: InboundConnection,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    mut force_close: watch::Receiver<bool>,
) {
    tracing::debug!("accepted connection");

    let outcome = tokio::select! {
        result = handler.serve_connection(&mut conn) => Some(result),
        _ = forced(&mut force_close) => None,
    };

    match outcome {
        Some(Ok(())) => tracing::debug!("connection served"),
        Some(Err(e)) if e.is_idle_timeout() => {
            metrics::record_handler_error(true);
            tracing::debug!(error = %e, "connection idle timeout");
        }
        Some(Err(e)) => {
            metrics::record_handler_error(false);
            tracing::warn!(error = %e, "failed to serve connection");
        }
        None => {
            metrics::record_forced_close();
            tracing::warn!("drain deadline exceeded, closing connection");
        }
    }

    close(&mut conn).await;
    // Socket first, so a freed permit never admits a connection past the limit.
    drop(conn);
    drop(permit);
    drop(guard);
}

/// Resolves once the coordinator asks workers to give up.
async fn forced(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|forced| *forced).await.is_err() {
        // Coordinator gone without forcing: never force.
        std::future::pending::<()>().await;
    }
}

async fn close(conn: &mut InboundConnection) {
    match conn.shutdown().await {
        Ok(()) => {}
        Err(e) if is_already_closed(&e) => tracing::trace!(error = %e, "connection already closed"),
        Err(e) => tracing::warn!(error = %e, "failed to close connection"),
    }
}

fn is_already_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}
