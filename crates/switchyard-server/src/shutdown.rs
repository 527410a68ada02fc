//! Shutdown of the relay's long-running tasks.
//!
//! Every agent connection token is a child of the coordinator's token, so one
//! cancel reaches the acceptor, the HTTP server and each read loop.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Owns the server's background tasks and the token that stops them.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Hand a background task to the coordinator under a name used in logs.
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    /// Cancel, then give all tracked tasks one shared deadline to finish.
    /// Tasks still running at the deadline are aborted.
    ///
    /// Returns `true` if every task finished on its own.
    pub async fn graceful_shutdown(self, timeout: Duration) -> bool {
        self.token.cancel();
        tracing::info!(
            task_count = self.tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for tasks to finish"
        );

        let deadline = Instant::now() + timeout;
        let mut drained = true;
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task finished"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "Task ended abnormally"),
                Err(_) => {
                    tracing::warn!(task = name, "Task still running at shutdown deadline, aborting");
                    handle.abort();
                    drained = false;
                }
            }
        }
        drained
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
