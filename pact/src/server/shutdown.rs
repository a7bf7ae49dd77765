//! Graceful shutdown for the mock server's background tasks.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Outcome of a shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every task finished within the timeout
    Graceful,
    /// The timeout elapsed and remaining tasks were aborted
    Aborted,
}

/// Signals tracked tasks to stop and waits for them.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<io::Result<()>>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Spawns a task that will be tracked.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        self.tasks.spawn(async move {
            let result = future.await;
            match &result {
                Ok(()) => info!(task = name, "Task completed"),
                Err(e) => warn!(task = name, error = %e, "Task failed"),
            }
            result
        });
    }

    /// Whether shutdown was already signaled.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signal shutdown and wait up to `timeout` for tracked tasks.
    pub async fn shutdown(&mut self, timeout: Duration) -> ShutdownOutcome {
        info!("Initiating graceful shutdown");
        self.shutdown_tx.send_replace(true);

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task panicked or was cancelled during shutdown");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => {
                info!("All tasks completed gracefully");
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                warn!(?timeout, "Shutdown timeout reached, aborting remaining tasks");
                self.tasks.abort_all();
                while self.tasks.join_next().await.is_some() {}
                ShutdownOutcome::Aborted
            }
        }
    }

    /// Returns the number of active tasks
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal. Also returns if the coordinator is gone.
    pub async fn recv(mut self) {
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tasks_stop_on_signal() {
        let mut coordinator = ShutdownCoordinator::new();
        let signal = coordinator.subscribe();
        coordinator.spawn("waiter", async move {
            signal.recv().await;
            Ok(())
        });
        assert_eq!(coordinator.task_count(), 1);

        let outcome = coordinator.shutdown(Duration::from_secs(1)).await;
        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert!(coordinator.is_shutdown());
        assert_eq!(coordinator.task_count(), 0);
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let outcome = coordinator.shutdown(Duration::from_millis(20)).await;
        assert_eq!(outcome, ShutdownOutcome::Aborted);
        assert_eq!(coordinator.task_count(), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_signal() {
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.shutdown(Duration::from_millis(10)).await;
        tokio::time::timeout(Duration::from_secs(1), coordinator.subscribe().recv())
            .await
            .unwrap();
    }
}
