//! Relay wire protocol
//!
//! Defines the payload contract (one JSON document per frame) and subprotocol selection.

mod payload;
mod subprotocol;

pub use payload::RelayMessage;
pub use subprotocol::select_subprotocol;
