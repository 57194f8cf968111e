//! Individual WebSocket connection
//!
//! Represents a single WebSocket connection, its lifecycle state, and its outbound queue.

use crate::error::{RelayError, RelayResult, SendFailureReason};
use crate::protocol::RelayMessage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection state
///
/// `Connecting -> Open -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake finished, not yet registered
    Connecting,
    /// Registered and receiving broadcasts
    Open,
    /// Removed from the registry; never reopens
    Closed,
}

struct Inner {
    state: ConnectionState,
    /// Dropped on close so the writer drains what is queued and then stops
    sender: Option<mpsc::Sender<RelayMessage>>,
}

/// A single WebSocket connection
pub struct Connection {
    /// Unique connection ID
    id: ConnectionId,

    /// State and outbound queue, changed together
    inner: Mutex<Inner>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection in the `Connecting` state
    pub fn new(id: ConnectionId, sender: mpsc::Sender<RelayMessage>) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                sender: Some(sender),
            }),
            created_at: Instant::now(),
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move `Connecting -> Open`
    ///
    /// Returns false if the connection was already closed.
    pub(crate) fn open(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connecting => {
                inner.state = ConnectionState::Open;
                true
            }
            ConnectionState::Open => true,
            ConnectionState::Closed => false,
        }
    }

    /// Move to `Closed` and release the outbound queue
    ///
    /// Returns true only for the call that performed the transition.
    pub(crate) fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Closed {
            return false;
        }
        inner.state = ConnectionState::Closed;
        inner.sender = None;
        true
    }

    /// Enqueue a message without waiting on the peer
    pub fn try_send(&self, message: RelayMessage) -> RelayResult<()> {
        let inner = self.inner.lock();
        let sender = match (&inner.state, &inner.sender) {
            (ConnectionState::Open, Some(sender)) => sender,
            _ => return Err(self.send_failure(SendFailureReason::Closed)),
        };

        sender.try_send(message).map_err(|e| {
            self.send_failure(match e {
                mpsc::error::TrySendError::Full(_) => SendFailureReason::BufferFull,
                mpsc::error::TrySendError::Closed(_) => SendFailureReason::Closed,
            })
        })
    }

    fn send_failure(&self, reason: SendFailureReason) -> RelayError {
        RelayError::SendFailure {
            connection_id: self.id,
            reason,
        }
    }

    /// Get connection age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}
