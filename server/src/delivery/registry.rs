use std::collections::HashMap;

use super::ClientId;
use crate::ws::{Connection, ConnectionId};

/// Live connections keyed by client ID. One connection per client: a second
/// registration for the same ID replaces the first.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ClientId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapping for `id`, returning the superseded connection.
    pub fn register(&mut self, id: ClientId, connection: Connection) -> Option<Connection> {
        let previous = self.connections.insert(id.clone(), connection);
        tracing::debug!(
            client_id = %id,
            replaced = previous.is_some(),
            connections = self.connections.len(),
            "Connection registered"
        );
        previous
    }

    /// Remove the mapping for `id`. Absent IDs are a no-op.
    pub fn unregister(&mut self, id: &str) -> Option<Connection> {
        let removed = self.connections.remove(id);
        if removed.is_some() {
            tracing::debug!(client_id = %id, "Connection unregistered");
        }
        removed
    }

    /// Remove the mapping for `id` only if it still points at `connection_id`.
    pub fn unregister_if(&mut self, id: &str, connection_id: ConnectionId) -> bool {
        let is_current = self
            .connections
            .get(id)
            .is_some_and(|current| current.id() == connection_id);
        if is_current {
            self.unregister(id);
        }
        is_current
    }

    pub fn lookup(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Visit every registered connection. Order is unspecified.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&ClientId, &Connection),
    {
        for (id, connection) in &self.connections {
            f(id, connection);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
