//! Built-in handler that relays each connection to a fixed upstream.

use std::future::Future;

use tokio::io::copy_bidirectional;

use crate::net::dialer::Dialer;
use crate::server::handler::{ConnectionHandler, HandlerError, InboundConnection};

/// Splices every inbound connection to `upstream` through the [`Dialer`].
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    dialer: Dialer,
    upstream: String,
}

impl ForwardHandler {
    pub fn new(dialer: Dialer, upstream: impl Into<String>) -> Self {
        Self {
            dialer,
            upstream: upstream.into(),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }
}

impl ConnectionHandler for ForwardHandler {
    fn serve_connection<'a>(
        &'a self,
        conn: &'a mut InboundConnection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send + 'a {
        async move {
            let mut upstream = self.dialer.dial("tcp", &self.upstream).await?;
            let (sent, received) = copy_bidirectional(conn, &mut upstream).await?;
            tracing::debug!(upstream = %self.upstream, sent, received, "relay finished");
            Ok(())
        }
    }
}
