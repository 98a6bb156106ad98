// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint streaming live updates for a single lead.
//!
//! Connect with `GET /ws?lead_id=<id>&token=<bearer token>`. Auth rides
//! in the query string because browser WebSocket clients cannot set an
//! `Authorization` header.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "message", "message": { ... }}
//! {"type": "lead_created", "lead": { ... }}
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Query parameters for the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub lead_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Validates the token before upgrading; a bad token gets a plain 401
/// instead of a handshake.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.accepts(query.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.lead_id))
}

/// Forward the lead's topic to the socket until either side goes away.
async fn handle_socket(socket: WebSocket, state: GatewayState, lead_id: String) {
    let mut rx = state.hub.subscribe(&lead_id);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    debug!(lead_id, "websocket subscriber attached");

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(payload) => {
                    if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(lead_id, skipped, "websocket subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // The stream is one-way; drop anything the client sends.
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(lead_id, "websocket subscriber detached");
}
