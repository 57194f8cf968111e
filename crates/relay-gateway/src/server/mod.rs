//! Gateway server setup
//!
//! Provides the WebSocket route, the liveness probe, and the server runner.

mod handler;
mod middleware;
mod state;

pub use handler::gateway_handler;
pub use middleware::apply_middleware;
pub use state::GatewayState;

use crate::broadcast::Relay;
use axum::{routing::get, Router};
use relay_common::{AppConfig, AppError};
use std::future::Future;
use tokio::net::TcpListener;

/// Body returned by the liveness probe
pub const HEALTH_RESPONSE: &str = "Server is running";

/// Path clients connect to
pub const WS_PATH: &str = "/ws";

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route(WS_PATH, get(gateway_handler))
        .route("/", get(health_check))
        .route("/health", get(health_check))
}

/// Health check endpoint
///
/// Independent of how many clients are connected.
async fn health_check() -> &'static str {
    HEALTH_RESPONSE
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    apply_middleware(create_router()).with_state(state)
}

/// Create `GatewayState` with a fresh relay
pub fn create_gateway_state(config: AppConfig) -> GatewayState {
    GatewayState::new(Relay::new(), config)
}

/// Serve `app` on an already bound listener until `shutdown` resolves
pub async fn run_server<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Gateway listening on ws://{}{}", addr, WS_PATH);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(AppError::Server)
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.server.socket_addr()?;

    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;

    let state = create_gateway_state(config);
    let relay = state.relay().clone();
    let app = create_app(state);

    run_server(listener, app, async move {
        shutdown_signal().await;
        relay.shutdown();
    })
    .await
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
