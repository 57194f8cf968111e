//! Relay error taxonomy
//!
//! None of these are fatal: each is recovered where it happens and logged with its kind.

use crate::connection::ConnectionId;
use std::fmt;
use thiserror::Error;

/// Why a single outbound send was not enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailureReason {
    /// The connection's outbound queue is full
    BufferFull,
    /// The connection is closing or already closed
    Closed,
}

impl fmt::Display for SendFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferFull => f.write_str("outbound buffer full"),
            Self::Closed => f.write_str("connection closed"),
        }
    }
}

/// Relay error type
#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound data is not one valid JSON document
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Enqueueing a broadcast onto one connection failed
    #[error("Send to {connection_id} failed: {reason}")]
    SendFailure {
        connection_id: ConnectionId,
        reason: SendFailureReason,
    },

    /// The transport reported an error on a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl RelayError {
    pub fn malformed(cause: impl fmt::Display) -> Self {
        Self::MalformedPayload(cause.to_string())
    }

    pub fn connection(cause: impl fmt::Display) -> Self {
        Self::ConnectionError(cause.to_string())
    }

    /// Stable name used as the `error_kind` log field
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "MalformedPayload",
            Self::SendFailure { .. } => "SendFailure",
            Self::ConnectionError(_) => "ConnectionError",
        }
    }
}

/// Relay result type
pub type RelayResult<T> = Result<T, RelayError>;
