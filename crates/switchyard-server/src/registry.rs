use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_core::errors::RelayError;
use switchyard_core::ids::ClientId;

use crate::client::{ClientConnection, ClientSnapshot};

/// Registry of all connected agents.
///
/// One coarse lock guards membership. It is held only for map operations and
/// for copying snapshots, never across a socket operation.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection under its own id. Ids are minted per accept, so
    /// there is no duplicate check.
    pub fn register(&self, conn: Arc<ClientConnection>) {
        let id = conn.id().clone();
        self.clients.write().insert(id, conn);
    }

    /// Remove a client by ID. No-op if absent.
    pub fn remove(&self, id: &ClientId) -> Option<Arc<ClientConnection>> {
        self.clients.write().remove(id)
    }

    /// Shared handle to a live connection. Its mutable state is reachable only
    /// through the connection's own locks.
    pub fn lookup(&self, id: &ClientId) -> Result<Arc<ClientConnection>, RelayError> {
        self.clients
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(id.clone()))
    }

    /// Copy every entry while holding the registry lock.
    pub fn snapshot(&self) -> Vec<ClientSnapshot> {
        let clients = self.clients.read();
        let mut list: Vec<ClientSnapshot> = clients.values().map(|c| c.snapshot()).collect();
        list.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        list
    }

    pub fn snapshot_of(&self, id: &ClientId) -> Result<ClientSnapshot, RelayError> {
        self.clients
            .read()
            .get(id)
            .map(|c| c.snapshot())
            .ok_or_else(|| RelayError::NotFound(id.clone()))
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.read().len()
    }
}
