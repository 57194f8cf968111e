//! Connection manager
//!
//! The registry of open connections, backed by `DashMap` for concurrent access.

use super::{Connection, ConnectionId};
use crate::protocol::RelayMessage;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all open WebSocket connections
///
/// A connection is inserted already `Open` and is `Closed` by the same call that removes it,
/// so every member is writable as far as the relay knows.
pub struct ConnectionManager {
    /// Open connections by ID
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection
    pub fn add_connection(&self, sender: mpsc::Sender<RelayMessage>) -> Arc<Connection> {
        let id = ConnectionId::new();
        let connection = Connection::new(id, sender);
        connection.open();
        self.connections.insert(id, connection.clone());

        tracing::debug!(connection_id = %id, "Connection added");

        connection
    }

    /// Remove a connection and mark it closed
    ///
    /// Returns `None` if it was not registered, so removing twice is a no-op.
    pub fn remove_connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(&id)?;
        connection.close();

        tracing::debug!(connection_id = %id, "Connection removed");

        Some(connection)
    }

    /// Check if a connection is registered
    pub fn has_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Get the total number of open connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Copy out the current members so callers can iterate without holding shard locks
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Close and remove every connection
    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|r| *r.key()).collect();

        ids.into_iter()
            .filter(|id| self.remove_connection(*id).is_some())
            .count()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .finish()
    }
}
