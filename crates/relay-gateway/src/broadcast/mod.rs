//! Message fanout
//!
//! Takes messages received on any connection and rebroadcasts them to all of them.

mod relay;

pub use relay::{BroadcastReport, Relay};
