//! # relay-gateway
//!
//! WebSocket relay: every JSON message a client sends is rebroadcast to every
//! connected client, the sender included.

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;

pub use broadcast::{BroadcastReport, Relay};
pub use error::{RelayError, RelayResult};
pub use server::run;
