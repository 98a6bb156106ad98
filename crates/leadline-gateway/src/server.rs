// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use leadline_core::EngineError;
use leadline_engine::Engine;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::notify::NotifyHub;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The routing engine.
    pub engine: Arc<Engine>,
    /// Per-lead notification topics feeding /ws subscribers.
    pub hub: Arc<NotifyHub>,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

/// Gateway server configuration (mirrors GatewayConfig from leadline-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Bearer token for auth (None rejects everything).
    pub bearer_token: Option<String>,
}

/// Build the gateway router.
///
/// Split out of [`start_server`] so tests can drive the app with
/// `tower::ServiceExt` without binding a socket.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    // Unauthenticated public routes (health for load balancers and systemd).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    // Routes requiring authentication.
    let api_routes = Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route(
            "/v1/connection",
            get(handlers::get_connection)
                .post(handlers::post_connection)
                .delete(handlers::delete_connection),
        )
        .route(
            "/v1/leads/{lead_id}/channel",
            post(handlers::post_lead_channel).delete(handlers::delete_lead_channel),
        )
        .route(
            "/v1/leads/{lead_id}/messages",
            get(handlers::get_lead_messages),
        )
        .route("/v1/leads/{lead_id}/read", post(handlers::post_lead_read))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route (auth happens during handshake, not via middleware).
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP/WebSocket server.
///
/// Binds to the configured host:port and serves:
/// - GET  /health (no auth)
/// - POST /v1/messages
/// - GET/POST/DELETE /v1/connection
/// - POST/DELETE /v1/leads/{lead_id}/channel
/// - GET  /v1/leads/{lead_id}/messages
/// - POST /v1/leads/{lead_id}/read
/// - GET  /ws (auth via query params)
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), EngineError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EngineError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| EngineError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
