//! Command dispatch onto agent sockets.

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::errors::RelayError;
use switchyard_core::ids::ClientId;
use switchyard_core::wire::Command;

use crate::registry::ClientRegistry;

/// Writes commands to agents under each connection's write lock.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ClientRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Send one command to one agent.
    ///
    /// The registry lock is released before the write starts. A failed or
    /// timed-out write asks the connection's read loop to tear it down; the
    /// entry itself is removed only by that loop.
    pub async fn dispatch(&self, id: &ClientId, command: &Command) -> Result<(), RelayError> {
        let conn = self.registry.lookup(id)?;
        let line = command.to_line()?;

        match conn.write_line(line, self.write_timeout).await {
            Ok(()) => {
                tracing::debug!(client_id = %id, command = %command.kind, "Command dispatched");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    client_id = %id,
                    command = %command.kind,
                    error = %e,
                    "Command dispatch failed"
                );
                if e.is_connection_failure() {
                    conn.request_shutdown();
                }
                Err(e)
            }
        }
    }
}
