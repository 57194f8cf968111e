//! WebSocket handler
//!
//! Upgrades `/ws` requests and drives each connection: a writer task drains the outbound
//! queue while the reader feeds inbound frames to the relay.

use crate::broadcast::Relay;
use crate::connection::{Connection, ConnectionId};
use crate::error::{RelayError, RelayResult};
use crate::protocol::{select_subprotocol, RelayMessage};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let ws = match select_subprotocol(&headers) {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };

    ws.max_message_size(state.config().relay.max_message_bytes)
        .on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket) {
    let relay = state.relay().clone();
    let settings = state.config().relay.clone();

    // Create the connection's outbound queue and register it
    let (tx, rx) = mpsc::channel::<RelayMessage>(settings.outbound_buffer);
    let connection = relay.accept(tx);
    let connection_id = connection.id();

    let (ws_sink, ws_stream) = socket.split();

    // The writer outlives the reader so anything already queued still flushes
    let mut send_task = tokio::spawn(write_loop(
        connection_id,
        ws_sink,
        rx,
        settings.ping_interval(),
    ));

    let result = tokio::select! {
        result = read_loop(&relay, &connection, ws_stream, settings.idle_timeout()) => result,
        joined = &mut send_task => joined.unwrap_or_else(|e| Err(RelayError::connection(e))),
    };

    match result {
        Ok(()) => {
            relay.on_close(connection_id);
        }
        // Closed by the registry (shutdown); whatever the transport did afterwards is expected
        Err(e) if !connection.is_open() => {
            tracing::debug!(
                connection_id = %connection_id,
                error = %e,
                "Transport ended after close"
            );
            relay.on_close(connection_id);
        }
        Err(e) => {
            relay.on_error(connection_id, &e);
        }
    }

    tracing::debug!(connection_id = %connection_id, "Connection task finished");
}

/// Feed inbound frames to the relay until the peer closes, errors, or goes idle
async fn read_loop(
    relay: &Relay,
    connection: &Connection,
    mut ws_stream: SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> RelayResult<()> {
    let connection_id = connection.id();

    loop {
        let next = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, ws_stream.next())
                .await
                .map_err(|_| {
                    RelayError::connection(format!("no traffic for {}s", limit.as_secs()))
                })?,
            None => ws_stream.next().await,
        };

        let Some(msg) = next else {
            tracing::debug!(connection_id = %connection_id, "Inbound stream ended");
            return Ok(());
        };

        match msg {
            Ok(Message::Text(text)) => {
                // Malformed payloads are logged by the relay; the connection stays open
                relay.on_message(connection_id, &text).ok();
            }
            Ok(Message::Binary(bytes)) => {
                relay.on_binary(connection_id, &bytes).ok();
            }
            Ok(Message::Ping(_)) => {
                tracing::trace!(connection_id = %connection_id, "Ping received");
                // Pong is handled automatically by axum
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!(connection_id = %connection_id, "Pong received");
            }
            Ok(Message::Close(frame)) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    close_frame = ?frame,
                    "Client closed connection"
                );
                return Ok(());
            }
            Err(e) => return Err(RelayError::connection(e)),
        }
    }
}

/// Drain the outbound queue in order, sending keepalive pings between messages
///
/// Returns `Ok` once the queue is released and fully sent, or the sink error that
/// stopped it.
async fn write_loop(
    connection_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<RelayMessage>,
    ping_interval: Option<Duration>,
) -> RelayResult<()> {
    let mut ticker = ping_interval.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let result = loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else {
                    // Queue released on close; everything queued before it has been sent
                    break Ok(());
                };
                if let Err(e) = ws_sink.send(Message::Text(msg.as_str().to_owned())).await {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Failed to send message to WebSocket"
                    );
                    break Err(RelayError::connection(e));
                }
            }
            () = next_tick(ticker.as_mut()) => {
                if let Err(e) = ws_sink.send(Message::Ping(Vec::new())).await {
                    tracing::debug!(connection_id = %connection_id, "Failed to send ping");
                    break Err(RelayError::connection(e));
                }
            }
        }
    };

    // Close the WebSocket when the queue is closed
    let _ = ws_sink.close().await;
    result
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
