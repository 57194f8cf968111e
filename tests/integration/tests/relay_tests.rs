//! Relay Integration Tests
//!
//! Each test starts its own gateway on an ephemeral port and talks to it over real sockets.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use integration_tests::{test_config, LogCapture, TestClient, TestServer};
use relay_gateway::server::HEALTH_RESPONSE;
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");

    for path in ["/", "/health"] {
        let response = server.get(path).await.expect("Request failed");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), HEALTH_RESPONSE);
    }
}

#[tokio::test]
async fn test_health_check_with_open_connections() {
    let server = TestServer::start().await.expect("Failed to start server");
    let _clients = server.connect_many(3).await.unwrap();

    let response = server.get("/").await.expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), HEALTH_RESPONSE);
}

#[tokio::test]
async fn test_cors_is_open() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .client
        .get(format!("{}/health", server.base_url()))
        .header("Origin", "https://frontend.example")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_message_reaches_sender_and_peer() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    clients[0].send_text(r#"{"x":1}"#).await.unwrap();

    for client in &mut clients {
        assert_eq!(client.recv_json().await.unwrap(), json!({"x": 1}));
    }
    for client in &mut clients {
        client.expect_silence().await.unwrap();
    }
}

#[tokio::test]
async fn test_payload_is_relayed_verbatim() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    let raw = r#"{ "effect": "ripple",  "pos": [0.5, 0.25], "meta": null }"#;
    clients[1].send_text(raw).await.unwrap();

    for client in &mut clients {
        assert_eq!(client.recv_text().await.unwrap(), raw);
    }
}

#[tokio::test]
async fn test_every_client_gets_exactly_one_copy() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(8).await.unwrap();

    clients[3].send_text(r#"{"n":42}"#).await.unwrap();

    for client in &mut clients {
        assert_eq!(client.recv_json().await.unwrap(), json!({"n": 42}));
    }
    for client in &mut clients {
        client.expect_silence().await.unwrap();
    }
}

#[tokio::test]
async fn test_messages_from_one_client_stay_in_order() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    for i in 0..20 {
        let message = json!({ "seq": i }).to_string();
        clients[0].send_text(&message).await.unwrap();
    }

    for client in &mut clients {
        for i in 0..20 {
            assert_eq!(client.recv_json().await.unwrap(), json!({ "seq": i }));
        }
    }
}

#[tokio::test]
async fn test_binary_json_is_relayed_as_text() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    clients[0].send_binary(br#"{"bin":true}"#).await.unwrap();

    for client in &mut clients {
        assert_eq!(client.recv_text().await.unwrap(), r#"{"bin":true}"#);
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_payload_is_dropped() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    clients[0].send_text("not-json").await.unwrap();

    for client in &mut clients {
        client.expect_silence().await.unwrap();
    }
    assert_eq!(server.relay().connections().connection_count(), 2);

    // The sender is still connected and still relaying
    clients[0].send_text(r#"{"ok":true}"#).await.unwrap();
    for client in &mut clients {
        assert_eq!(client.recv_json().await.unwrap(), json!({"ok": true}));
    }
}

#[tokio::test]
async fn test_invalid_utf8_binary_is_dropped() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect().await.unwrap();

    client.send_binary(&[0xff, 0x00, 0xfe]).await.unwrap();
    client.expect_silence().await.unwrap();

    client.send_text("[]").await.unwrap();
    assert_eq!(client.recv_text().await.unwrap(), "[]");
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_disconnected_client_is_skipped() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut a = server.connect().await.unwrap();
    let b = server.connect().await.unwrap();
    let mut c = server.connect().await.unwrap();

    b.close().await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    a.send_text(r#"{"y":2}"#).await.unwrap();

    assert_eq!(a.recv_json().await.unwrap(), json!({"y": 2}));
    assert_eq!(c.recv_json().await.unwrap(), json!({"y": 2}));
}

#[tokio::test]
async fn test_dropped_socket_is_removed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut a = server.connect().await.unwrap();
    let b = server.connect().await.unwrap();

    // No close handshake: the transport just goes away
    drop(b);
    server.wait_for_connections(1).await.unwrap();

    a.send_text("1").await.unwrap();
    assert_eq!(a.recv_text().await.unwrap(), "1");
}

#[tokio::test]
async fn test_subprotocol_is_echoed() {
    let server = TestServer::start().await.expect("Failed to start server");

    let client = TestClient::connect(&server.ws_url(), Some("visual-v1, visual-v2"))
        .await
        .unwrap();
    assert_eq!(client.protocol.as_deref(), Some("visual-v1"));

    let client = TestClient::connect(&server.ws_url(), None).await.unwrap();
    assert_eq!(client.protocol, None);
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();
    let relay = server.relay().clone();

    server.shutdown().await.unwrap();

    assert_eq!(relay.connections().connection_count(), 0);
    for client in &mut clients {
        client.expect_closed().await.unwrap();
    }
}

#[tokio::test]
async fn test_shutdown_is_not_a_connection_error() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = TestServer::start().await.expect("Failed to start server");
    let mut clients = server.connect_many(2).await.unwrap();

    server.shutdown().await.unwrap();
    for client in &mut clients {
        client.expect_closed().await.unwrap();
    }
    logs.wait_for("Connection task finished", 2).await.unwrap();

    assert_eq!(logs.count("Closed all connections"), 1);
    assert_eq!(logs.count("ConnectionError"), 0, "{}", logs.contents());
}

#[tokio::test]
async fn test_idle_client_is_dropped() {
    let mut config = test_config();
    config.relay.ping_interval_secs = 0;
    config.relay.idle_timeout_secs = 1;

    let server = TestServer::start_with_config(config)
        .await
        .expect("Failed to start server");
    let mut client = server.connect().await.unwrap();

    client.expect_closed().await.unwrap();
    server.wait_for_connections(0).await.unwrap();
}
