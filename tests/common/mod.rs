//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portgate::lifecycle::{Readiness, ReadyState, Shutdown};
use portgate::server::{ConnectionHandler, HandlerError, InboundConnection, Params, Server, ServerError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// Trigger shutdown and wait for the drain to finish.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.handle.await.unwrap()
    }
}

/// Start `handler` on `127.0.0.1:0` and wait until it is listening.
pub async fn start_server<H: ConnectionHandler>(handler: H, params: Params) -> RunningServer {
    let server = Server::new(handler);
    let readiness = Readiness::new();
    let shutdown = Shutdown::new();

    let signalled = shutdown.signalled();
    let ready = readiness.clone();
    let handle = tokio::spawn(async move {
        server.listen_and_serve(&params, &ready, signalled).await
    });

    match readiness.wait().await {
        ReadyState::Listening(addr) => RunningServer {
            addr,
            shutdown,
            handle,
        },
        other => panic!("server did not start: {other:?}"),
    }
}

pub fn params(connections: usize) -> Params {
    Params::new("127.0.0.1:0", connections)
}

/// Start a TCP echo backend on an ephemeral port.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Counts handler invocations and the peak number running at once.
#[derive(Debug, Default, Clone)]
pub struct Gauge {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }
}

struct GaugeGuard(Gauge);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.served.fetch_add(1, Ordering::SeqCst);
    }
}

/// Writes `ok`, holds the connection for a while, then returns.
#[derive(Debug, Clone)]
pub struct HoldHandler {
    pub hold: Duration,
    pub gauge: Gauge,
}

impl HoldHandler {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            gauge: Gauge::default(),
        }
    }
}

impl ConnectionHandler for HoldHandler {
    fn serve_connection<'a>(
        &'a self,
        conn: &'a mut InboundConnection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send + 'a {
        async move {
            let _guard = self.gauge.enter();
            conn.write_all(b"ok").await?;
            tokio::time::sleep(self.hold).await;
            Ok(())
        }
    }
}

/// Echoes until EOF, counting idle timeouts.
#[derive(Debug, Default, Clone)]
pub struct EchoHandler {
    pub idle_timeouts: Arc<AtomicUsize>,
}

impl EchoHandler {
    pub fn idle_timeouts(&self) -> usize {
        self.idle_timeouts.load(Ordering::SeqCst)
    }
}

impl ConnectionHandler for EchoHandler {
    fn serve_connection<'a>(
        &'a self,
        conn: &'a mut InboundConnection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send + 'a {
        async move {
            let mut buf = [0u8; 1024];
            loop {
                let n = match conn.read(&mut buf).await {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(e) => {
                        let err = HandlerError::from(e);
                        if err.is_idle_timeout() {
                            self.idle_timeouts.fetch_add(1, Ordering::SeqCst);
                        }
                        return Err(err);
                    }
                };
                conn.write_all(&buf[..n]).await?;
            }
        }
    }
}

/// Panics on every connection.
#[derive(Debug, Default, Clone)]
pub struct PanicHandler;

impl ConnectionHandler for PanicHandler {
    fn serve_connection<'a>(
        &'a self,
        _conn: &'a mut InboundConnection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send + 'a {
        async move { panic!("handler blew up") }
    }
}
