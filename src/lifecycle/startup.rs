//! Startup readiness.
//!
//! [`Readiness`] is a one-shot latch the server settles once binding has either
//! succeeded or failed. Settling again is a no-op, so both paths may call it
//! without coordination, and waiters never block forever.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

/// Startup outcome as seen by waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    /// Not settled yet.
    Pending,
    /// Listener bound; accept loop running.
    Listening(SocketAddr),
    /// Startup failed with the given reason.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<ReadyState>>,
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReadyState::Pending);
        Self { tx: Arc::new(tx) }
    }

    /// Settle as listening on `addr`. Returns false if already settled.
    pub fn listening(&self, addr: SocketAddr) -> bool {
        self.settle(ReadyState::Listening(addr))
    }

    /// Settle as failed. Returns false if already settled.
    pub fn failed(&self, reason: impl Into<String>) -> bool {
        self.settle(ReadyState::Failed(reason.into()))
    }

    fn settle(&self, state: ReadyState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == ReadyState::Pending {
                *current = state;
                true
            } else {
                false
            }
        })
    }

    pub fn state(&self) -> ReadyState {
        self.tx.borrow().clone()
    }

    /// Wait until settled.
    pub async fn wait(&self) -> ReadyState {
        let mut rx = self.tx.subscribe();
        let settled = match rx.wait_for(|state| *state != ReadyState::Pending).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.state(),
        };
        settled
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn settles_once() {
        let readiness = Readiness::new();
        assert_eq!(readiness.state(), ReadyState::Pending);

        assert!(readiness.failed("address in use"));
        assert!(!readiness.listening("127.0.0.1:1080".parse().unwrap()));
        assert!(!readiness.failed("again"));
        assert_eq!(readiness.state(), ReadyState::Failed("address in use".into()));
    }

    #[tokio::test]
    async fn waiters_wake_on_settle() {
        let readiness = Readiness::new();
        let waiter = {
            let readiness = readiness.clone();
            tokio::spawn(async move { readiness.wait().await })
        };

        let addr: SocketAddr = "127.0.0.1:1080".parse().unwrap();
        readiness.listening(addr);
        let state = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, ReadyState::Listening(addr));
    }

    #[tokio::test]
    async fn wait_after_settle_returns_immediately() {
        let readiness = Readiness::new();
        readiness.failed("bind failed");
        assert_eq!(readiness.wait().await, ReadyState::Failed("bind failed".into()));
    }
}
