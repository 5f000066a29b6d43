//! The protocol handler seam.

use std::future::Future;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::net::dialer::DialError;
use crate::net::idle::{is_idle_timeout, IdleTimeoutStream};

/// Inbound connection as handed to a [`ConnectionHandler`].
pub type InboundConnection = IdleTimeoutStream<TcpStream>;

/// Why a handler gave up on a connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error("{0}")]
    Protocol(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an application-level failure.
    pub fn protocol(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Protocol(err.into())
    }

    /// True if the connection was dropped for going idle, either side.
    pub fn is_idle_timeout(&self) -> bool {
        match self {
            Self::Io(e) => is_idle_timeout(e),
            Self::Dial(_) => false,
            Self::Protocol(e) => e
                .downcast_ref::<std::io::Error>()
                .is_some_and(is_idle_timeout),
        }
    }
}

/// Application protocol spoken over each accepted connection.
///
/// Called once per connection on that connection's own task. The connection
/// is borrowed, so a handler cannot keep it past its return; the worker closes
/// it afterwards.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn serve_connection<'a>(
        &'a self,
        conn: &'a mut InboundConnection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send + 'a;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::idle::{Direction, IdleTimeout};
    use std::io;

    fn idle_error() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, IdleTimeout { direction: Direction::Read })
    }

    #[test]
    fn classifies_idle_timeouts() {
        assert!(HandlerError::from(idle_error()).is_idle_timeout());
        assert!(HandlerError::protocol(idle_error()).is_idle_timeout());

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(!HandlerError::from(reset).is_idle_timeout());
        assert!(!HandlerError::protocol("bad greeting").is_idle_timeout());
    }
}
