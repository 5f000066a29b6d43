//! TCP listener with admission control.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Hand out connection permits from a fixed-size pool
//! - Accept incoming TCP connections
//!
//! Callers acquire a permit *before* accepting, so at most `max_connections`
//! sockets are ever awaiting or undergoing handling. Bursts beyond that wait in
//! the OS backlog.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// A permit pool needs at least one slot.
    #[error("max connections must be at least 1")]
    ZeroCapacity,
    /// The permit pool was closed.
    #[error("connection permit pool closed")]
    PoolClosed,
}

/// Lifecycle of a server's listener, as reported by `Server::state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Created,
    Listening,
    Draining,
    Stopped,
}

impl std::fmt::Display for AcceptorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AcceptorState::Created => "created",
            AcceptorState::Listening => "listening",
            AcceptorState::Draining => "draining",
            AcceptorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A bound TCP listener paired with its connection permit pool.
pub struct Acceptor {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    permits: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
    local_addr: SocketAddr,
}

impl Acceptor {
    /// Bind to `addr` (`host:port`) with a pool of `max_connections` permits.
    pub async fn bind(addr: &str, max_connections: usize) -> Result<Self, ListenerError> {
        if max_connections == 0 {
            return Err(ListenerError::ZeroCapacity);
        }

        let bind_error = |source| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            local_addr,
        })
    }

    /// Take a connection slot, waiting while the pool is exhausted.
    pub async fn acquire(&self) -> Result<ConnectionPermit, ListenerError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::PoolClosed)?;
        Ok(ConnectionPermit { _permit: permit })
    }

    /// Accept the next connection. Acquire a permit first.
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.permits.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
