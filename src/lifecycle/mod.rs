//! Task lifecycle coordination.
//!
//! # Responsibilities
//! - Shutdown signaling for long-running tasks (server, probers)
//! - Bounded joining: a stopping task gets a grace period, then is aborted
//!
//! # Design Decisions
//! - Broadcast channel so one trigger reaches any number of subscribers
//! - Stopping never blocks indefinitely on a hung task

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that long-running tasks subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait up to `grace` for a task to finish, aborting it on timeout.
///
/// Returns true if the task finished on its own.
pub async fn join_within(handle: JoinHandle<()>, grace: Duration) -> bool {
    let mut handle = handle;
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(_) => true,
        Err(_) => {
            handle.abort();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn join_within_aborts_hung_tasks() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(!join_within(handle, Duration::from_millis(20)).await);

        let handle = tokio::spawn(async {});
        assert!(join_within(handle, Duration::from_millis(100)).await);
    }
}
