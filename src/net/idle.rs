//! Idle-timeout stream wrapper.
//!
//! Every successful read or write pushes the matching deadline out to
//! `now + timeout`. The deadline applies to the *next* operation, so a fresh
//! wrapper only times out if a deadline was armed explicitly (the acceptor does
//! this for inbound reads).

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{Instant, Sleep};

/// Which half of the stream went idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Payload of the `io::Error` returned when an idle deadline expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimeout {
    pub direction: Direction,
}

impl fmt::Display for IdleTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle timeout expired while waiting to {}", self.direction)
    }
}

impl std::error::Error for IdleTimeout {}

/// Returns true if `err` was produced by an expired idle deadline.
pub fn is_idle_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
        && err
            .get_ref()
            .is_some_and(|inner| inner.is::<IdleTimeout>())
}

/// A stream whose reads and writes fail once they stay idle past a deadline.
#[derive(Debug)]
pub struct IdleTimeoutStream<S> {
    inner: S,
    timeout: Duration,
    read_deadline: Option<Pin<Box<Sleep>>>,
    write_deadline: Option<Pin<Box<Sleep>>>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl<S> IdleTimeoutStream<S> {
    /// Wrap `inner`. A zero `timeout` disables deadline refreshing.
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            read_deadline: None,
            write_deadline: None,
            local_addr: None,
            peer_addr: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arm the read deadline explicitly.
    pub fn set_read_deadline(&mut self, deadline: Instant) {
        arm(&mut self.read_deadline, deadline);
    }

    /// Arm the write deadline explicitly.
    pub fn set_write_deadline(&mut self, deadline: Instant) {
        arm(&mut self.write_deadline, deadline);
    }

    pub fn read_deadline(&self) -> Option<Instant> {
        self.read_deadline.as_ref().map(|sleep| sleep.deadline())
    }

    pub fn write_deadline(&self) -> Option<Instant> {
        self.write_deadline.as_ref().map(|sleep| sleep.deadline())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn refresh(&mut self, direction: Direction) {
        if self.timeout.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.timeout;
        match direction {
            Direction::Read => arm(&mut self.read_deadline, deadline),
            Direction::Write => arm(&mut self.write_deadline, deadline),
        }
    }

    /// Called while the inner stream is pending. Registers the deadline timer
    /// with `cx` and fails once it has fired.
    fn poll_deadline<T>(&mut self, direction: Direction, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        let slot = match direction {
            Direction::Read => &mut self.read_deadline,
            Direction::Write => &mut self.write_deadline,
        };
        let Some(sleep) = slot else {
            return Poll::Pending;
        };
        if sleep.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }

        tracing::debug!(
            local_addr = ?self.local_addr,
            peer_addr = ?self.peer_addr,
            %direction,
            "idle timeout"
        );
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            IdleTimeout { direction },
        )))
    }
}

impl IdleTimeoutStream<TcpStream> {
    /// Wrap a TCP stream, remembering its addresses for timeout logs.
    pub fn from_tcp(stream: TcpStream, timeout: Duration) -> Self {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        let mut wrapped = Self::new(stream, timeout);
        wrapped.local_addr = local_addr;
        wrapped.peer_addr = peer_addr;
        wrapped
    }
}

fn arm(slot: &mut Option<Pin<Box<Sleep>>>, deadline: Instant) {
    match slot {
        Some(sleep) => sleep.as_mut().reset(deadline),
        None => *slot = Some(Box::pin(tokio::time::sleep_until(deadline))),
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IdleTimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.refresh(Direction::Read);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_deadline(Direction::Read, cx),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IdleTimeoutStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.refresh(Direction::Write);
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_deadline(Direction::Write, cx),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn first_read_has_no_deadline() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = IdleTimeoutStream::new(server, TIMEOUT);
        assert!(conn.read_deadline().is_none());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            client.write_all(b"x").await.unwrap();
            // keep the peer open so the next read can only time out
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let mut buf = [0u8; 1];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"x");
        assert!(conn.read_deadline().is_some());

        let start = Instant::now();
        let err = conn.read(&mut buf).await.unwrap_err();
        assert!(is_idle_timeout(&err));
        assert!(start.elapsed() >= TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn armed_read_deadline_fires() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = IdleTimeoutStream::new(server, TIMEOUT);
        conn.set_read_deadline(Instant::now() + TIMEOUT);

        let mut buf = [0u8; 8];
        let err = conn.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(is_idle_timeout(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn write_deadline_refreshes_after_success() {
        let (_client, server) = tokio::io::duplex(4);
        let mut conn = IdleTimeoutStream::new(server, TIMEOUT);

        conn.write_all(b"abcd").await.unwrap();
        assert!(conn.write_deadline().is_some());

        // The duplex buffer is full and nobody drains it.
        let err = conn.write_all(b"e").await.unwrap_err();
        assert!(is_idle_timeout(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_never_arms() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = IdleTimeoutStream::new(server, Duration::ZERO);

        client.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        conn.read_exact(&mut buf).await.unwrap();
        conn.write_all(b"ok").await.unwrap();

        assert!(conn.read_deadline().is_none());
        assert!(conn.write_deadline().is_none());
    }

    #[test]
    fn other_errors_are_not_idle_timeouts() {
        let plain = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
        assert!(!is_idle_timeout(&plain));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(!is_idle_timeout(&reset));

        let idle = io::Error::new(
            io::ErrorKind::TimedOut,
            IdleTimeout { direction: Direction::Write },
        );
        assert!(is_idle_timeout(&idle));
        assert_eq!(
            idle.to_string(),
            "idle timeout expired while waiting to write"
        );
    }
}
