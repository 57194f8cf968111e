//! Subprotocol selection
//!
//! The relay has no protocol of its own to negotiate. Whatever the client offers
//! first is acknowledged, which keeps proxies that require a subprotocol echo happy.

use axum::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap};

/// Pick the first subprotocol offered by the client, if any
///
/// Only the first `Sec-WebSocket-Protocol` header is read, the same one the upgrade
/// matches against when echoing.
pub fn select_subprotocol(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SEC_WEBSOCKET_PROTOCOL)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(String::from)
}
