use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Progress of a single agent launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    NotStarted,
    Starting,
    Polling,
    Ready,
    TimedOut,
    LaunchFailed,
}

impl LaunchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LaunchState::Ready | LaunchState::TimedOut | LaunchState::LaunchFailed
        )
    }
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchState::NotStarted => "not started",
            LaunchState::Starting => "starting",
            LaunchState::Polling => "polling",
            LaunchState::Ready => "ready",
            LaunchState::TimedOut => "timed out",
            LaunchState::LaunchFailed => "launch failed",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation shared between a launch and whoever may stop it.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Cancellation::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters_and_is_idempotent() {
        let cancellation = Cancellation::new();
        let waiter = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move { cancellation.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!cancellation.is_cancelled());

        cancellation.cancel();
        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
        assert!(cancellation.is_cancelled());

        // Already cancelled tokens resolve immediately.
        cancellation.cancelled().await;
    }

    #[test]
    fn test_terminal_states() {
        assert!(LaunchState::Ready.is_terminal());
        assert!(LaunchState::TimedOut.is_terminal());
        assert!(LaunchState::LaunchFailed.is_terminal());
        assert!(!LaunchState::Polling.is_terminal());
        assert_eq!(LaunchState::LaunchFailed.to_string(), "launch failed");
    }
}
