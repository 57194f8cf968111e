//! Middleware stack for the gateway
//!
//! Request tracing and fully open CORS: any origin, method, and header is allowed.

use axum::{body::Body, http::Request, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use super::GatewayState;

/// Apply middleware stack to the router
pub fn apply_middleware(router: Router<GatewayState>) -> Router<GatewayState> {
    router
        // CORS (innermost - applied last to outgoing responses)
        .layer(create_cors_layer())
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// Create a permissive CORS layer
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
