//! Connection management
//!
//! Tracks live WebSocket connections and their outbound queues.

mod connection;
mod manager;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use manager::ConnectionManager;
