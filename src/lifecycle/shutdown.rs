//! Shutdown coordination for the gateway.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Fan-out shutdown trigger.
///
/// The trigger is sticky: tasks that subscribe after [`trigger`](Self::trigger)
/// still observe it. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// A future that completes once [`trigger`](Self::trigger) has been called,
    /// before or after this future was created.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // The sender is kept alive by every `Shutdown` clone; if all of
            // them are gone nobody can trigger, so finish as well.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
