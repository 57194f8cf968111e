//! Relay message format
//!
//! The relay does not interpret message shape. A payload is accepted when it is
//! one syntactically valid JSON document and is retransmitted byte-for-byte.

use serde::de::IgnoredAny;
use std::fmt;
use std::sync::Arc;

/// A validated JSON document, held as the exact text that goes on the wire
///
/// Cloning is cheap: every recipient of a broadcast shares the same buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayMessage {
    text: Arc<str>,
}

impl RelayMessage {
    /// Validate raw text as JSON without building a value tree
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<IgnoredAny>(raw)?;
        Ok(Self { text: Arc::from(raw) })
    }

    /// The exact text sent to clients
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayMessage")
            .field("len", &self.text.len())
            .finish()
    }
}

impl fmt::Display for RelayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
