//! Relay
//!
//! Owns the connection registry and turns connection events into broadcasts.

use crate::connection::{Connection, ConnectionId, ConnectionManager};
use crate::error::{RelayError, RelayResult};
use crate::protocol::RelayMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of one fanout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections a send was attempted on
    pub attempted: usize,
    /// Sends that were enqueued
    pub sent: usize,
    /// Sends that failed (logged individually)
    pub failed: usize,
}

/// The relay
///
/// Every message received on a connection is sent to every open connection, the sender
/// included. Each instance has its own registry.
#[derive(Clone, Default)]
pub struct Relay {
    connections: Arc<ConnectionManager>,
}

impl Relay {
    /// Create a relay with an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the connection registry
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Register a freshly upgraded connection
    ///
    /// It takes part in every broadcast that snapshots the registry after this returns.
    pub fn accept(&self, sender: mpsc::Sender<RelayMessage>) -> Arc<Connection> {
        let connection = self.connections.add_connection(sender);

        tracing::info!(
            connection_id = %connection.id(),
            connections = self.connections.connection_count(),
            "New client connected"
        );

        connection
    }

    /// Handle a text frame received on `from`
    ///
    /// Malformed input is logged and dropped; the connection stays open.
    pub fn on_message(&self, from: ConnectionId, raw: &str) -> RelayResult<BroadcastReport> {
        let message = match RelayMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => return Err(log_malformed(from, RelayError::malformed(e))),
        };

        tracing::trace!(
            connection_id = %from,
            bytes = message.as_str().len(),
            "Message received"
        );

        Ok(self.broadcast(&message))
    }

    /// Handle a binary frame received on `from`
    ///
    /// UTF-8 bytes are handled exactly like a text frame.
    pub fn on_binary(&self, from: ConnectionId, raw: &[u8]) -> RelayResult<BroadcastReport> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.on_message(from, text),
            Err(e) => Err(log_malformed(from, RelayError::malformed(e))),
        }
    }

    /// Send `message` to every connection registered at the time of the call
    ///
    /// Sends are enqueued and never awaited; one failing connection does not stop the rest.
    pub fn broadcast(&self, message: &RelayMessage) -> BroadcastReport {
        let targets = self.connections.snapshot();
        let mut report = BroadcastReport {
            attempted: targets.len(),
            ..BroadcastReport::default()
        };

        for connection in targets {
            match connection.try_send(message.clone()) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %connection.id(),
                        error_kind = e.kind(),
                        error = %e,
                        "Broadcast delivery failed"
                    );
                }
            }
        }

        tracing::debug!(
            attempted = report.attempted,
            sent = report.sent,
            failed = report.failed,
            "Message broadcast to all connections"
        );

        report
    }

    /// Handle a closed connection
    ///
    /// Returns false if it had already been removed.
    pub fn on_close(&self, id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove_connection(id) else {
            return false;
        };

        tracing::info!(
            connection_id = %id,
            age_ms = connection.age().as_millis(),
            connections = self.connections.connection_count(),
            "Client disconnected"
        );

        true
    }

    /// Handle a transport error; removes the connection exactly like a close
    pub fn on_error(&self, id: ConnectionId, cause: &RelayError) -> bool {
        tracing::warn!(
            connection_id = %id,
            error_kind = cause.kind(),
            error = %cause,
            "Connection error"
        );
        self.on_close(id)
    }

    /// Close every connection (server shutdown)
    pub fn shutdown(&self) -> usize {
        let closed = self.connections.close_all();
        tracing::info!(closed = closed, "Closed all connections");
        closed
    }
}

fn log_malformed(from: ConnectionId, error: RelayError) -> RelayError {
    tracing::error!(
        connection_id = %from,
        error_kind = error.kind(),
        error = %error,
        "Error processing message"
    );
    error
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("connections", &self.connections)
            .finish()
    }
}
