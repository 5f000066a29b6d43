//! Connection server: admission-controlled accept loop and graceful shutdown.
//!
//! # Data Flow
//! ```text
//! listen_and_serve
//!     → Acceptor::bind (settle Readiness either way)
//!     → accept loop task: acquire permit → accept → Dispatcher
//!     → worker task per connection: handler → close → release permit
//!
//! shutdown future completes
//!     → stop accept loop (listener dropped, new connects refused)
//!     → await accept loop exit
//!     → wait for in-flight workers (optionally bounded by drain timeout)
//! ```

pub mod forward;
pub mod handler;
mod worker;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::config::GateConfig;
use crate::lifecycle::Readiness;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Acceptor, AcceptorState, ConnectionPermit, ListenerError};
use crate::observability::metrics;

pub use forward::ForwardHandler;
pub use handler::{ConnectionHandler, HandlerError, InboundConnection};
use worker::Dispatcher;

/// Pause after a failed accept so resource exhaustion does not spin the loop.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(10);

/// Listener-level failures. Nothing from an individual connection ends up here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listen(#[from] ListenerError),
    #[error("accept loop failed: {0}")]
    AcceptLoop(#[source] JoinError),
}

/// Parameters of one server run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// `host:port` to bind.
    pub addr: String,
    /// Size of the permit pool.
    pub connections: usize,
    /// Inbound idle timeout; zero disables it.
    pub idle_timeout: Duration,
    /// Upper bound on the drain; `None` waits for every connection.
    pub drain_timeout: Option<Duration>,
}

impl Params {
    pub fn new(addr: impl Into<String>, connections: usize) -> Self {
        Self {
            addr: addr.into(),
            connections,
            idle_timeout: Duration::from_secs(15),
            drain_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = Some(drain_timeout);
        self
    }
}

impl From<&GateConfig> for Params {
    fn from(config: &GateConfig) -> Self {
        Self {
            addr: config.listener.bind_address(),
            connections: config.listener.max_connections,
            idle_timeout: config.timeouts.idle(),
            drain_timeout: config.listener.drain_timeout(),
        }
    }
}

/// Serves a [`ConnectionHandler`] over TCP.
pub struct Server<H> {
    handler: Arc<H>,
    state: watch::Sender<AcceptorState>,
}

impl<H: ConnectionHandler> Server<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            state: watch::Sender::new(AcceptorState::Created),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Where the listener is in its lifecycle.
    pub fn state(&self) -> AcceptorState {
        *self.state.borrow()
    }

    fn enter(&self, state: AcceptorState) {
        tracing::debug!(%state, "acceptor state");
        self.state.send_replace(state);
    }

    /// Bind, serve until `shutdown` completes, then drain.
    ///
    /// `readiness` is settled whether or not binding succeeds. Returns once
    /// the accept loop has stopped and every in-flight connection has been
    /// released.
    pub async fn listen_and_serve<F>(
        &self,
        params: &Params,
        readiness: &Readiness,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let acceptor = match Acceptor::bind(&params.addr, params.connections).await {
            Ok(acceptor) => acceptor,
            Err(e) => {
                self.enter(AcceptorState::Stopped);
                readiness.failed(e.to_string());
                return Err(e.into());
            }
        };
        let local_addr = acceptor.local_addr();
        self.enter(AcceptorState::Listening);

        let tracker = ConnectionTracker::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (force_tx, force_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.handler),
            tracker.clone(),
            params.idle_timeout,
            force_rx,
        );
        let accept_loop = tokio::spawn(accept_loop(acceptor, dispatcher, stop_rx));

        tracing::debug!(address = %local_addr, "listener started");
        readiness.listening(local_addr);

        shutdown.await;
        self.enter(AcceptorState::Draining);
        tracing::info!(
            in_flight = tracker.active_count(),
            "shutdown requested, closing listener"
        );
        let _ = stop_tx.send(true);
        let stopped = accept_loop.await;

        drain(&tracker, params.drain_timeout, &force_tx).await;
        tracing::debug!("all connections released");
        self.enter(AcceptorState::Stopped);
        stopped.map_err(ServerError::AcceptLoop)
    }
}

/// Source of admitted connections. [`Acceptor`] is the only production one.
trait Incoming: Send + Sync + 'static {
    fn acquire(&self) -> impl Future<Output = Result<ConnectionPermit, ListenerError>> + Send;
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
    fn local_addr(&self) -> SocketAddr;
}

impl Incoming for Acceptor {
    fn acquire(&self) -> impl Future<Output = Result<ConnectionPermit, ListenerError>> + Send {
        Acceptor::acquire(self)
    }

    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        Acceptor::accept(self)
    }

    fn local_addr(&self) -> SocketAddr {
        Acceptor::local_addr(self)
    }
}

async fn accept_loop<A: Incoming, H: ConnectionHandler>(
    incoming: A,
    dispatcher: Dispatcher<H>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        // Permit first: a full pool stops us from accepting at all.
        let permit = tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => break,
            permit = incoming.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "cannot acquire connection permit");
                    break;
                }
            },
        };

        let accepted = tokio::select! {
            biased;
            _ = stop.wait_for(|stop| *stop) => break,
            accepted = incoming.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                metrics::record_accepted();
                dispatcher.dispatch(stream, peer, permit);
            }
            Err(e) => {
                drop(permit);
                metrics::record_accept_error();
                tracing::warn!(error = %e, "failed to accept connection");
                tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
            }
        }
    }

    let addr = incoming.local_addr();
    drop(incoming);
    tracing::debug!(address = %addr, "listener stopped");
}

async fn drain(tracker: &ConnectionTracker, limit: Option<Duration>, force: &watch::Sender<bool>) {
    let Some(limit) = limit else {
        tracker.wait_idle().await;
        return;
    };

    if tokio::time::timeout(limit, tracker.wait_idle()).await.is_err() {
        tracing::warn!(
            remaining = tracker.active_count(),
            ?limit,
            "drain deadline exceeded, closing remaining connections"
        );
        let _ = force.send(true);
        tracker.wait_idle().await;
    }
}
