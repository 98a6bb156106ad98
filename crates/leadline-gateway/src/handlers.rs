// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Tenant identity arrives pre-resolved in `X-Tenant-User` and
//! `X-Company-Id` headers (the upstream session layer owns auth of the
//! human; the bearer token authenticates the caller service). Engine
//! errors map onto status codes here and nowhere else.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use leadline_core::EngineError;
use leadline_core::types::{Connection, LeadChannel, MessageRecord, SendMethod, TenantContext, TenantUser, now_ts};
use leadline_engine::{NewConnection, SendRequest};
use leadline_storage::queries::{leads, messages, tenant_users};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_url: Option<String>,
}

/// Maps an engine error onto the HTTP surface.
pub fn error_response(err: EngineError) -> Response {
    let status = match &err {
        EngineError::DeliveryBlocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::AccountNotFound { .. } | EngineError::LeadNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::ConnectionInaccessible { .. } => StatusCode::CONFLICT,
        EngineError::PlatformUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let invite_url = match &err {
        EngineError::ConnectionInaccessible { invite_url, .. } => Some(invite_url.clone()),
        _ => None,
    };
    let body = ErrorResponse {
        error: err.to_string(),
        kind: err.kind().to_string(),
        invite_url,
    };
    (status, Json(body)).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            kind: "bad_request".to_string(),
            invite_url: None,
        }),
    )
        .into_response()
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} not found"),
            kind: "not_found".to_string(),
            invite_url: None,
        }),
    )
        .into_response()
}

/// Extracts the tenant identity headers, refreshing the identity mirror
/// as a side effect.
async fn tenant_ctx(state: &GatewayState, headers: &HeaderMap) -> Result<TenantContext, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(tenant_user_id), Some(company_id)) = (header("x-tenant-user"), header("x-company-id"))
    else {
        return Err(bad_request("X-Tenant-User and X-Company-Id headers are required"));
    };
    let ctx = TenantContext {
        tenant_user_id,
        company_id,
    };
    let touched = tenant_users::touch(
        state.engine.db(),
        &TenantUser {
            id: ctx.tenant_user_id.clone(),
            company_id: ctx.company_id.clone(),
            display_name: None,
            last_active_at: now_ts(),
        },
    )
    .await;
    if let Err(e) = touched {
        warn!(tenant_user_id = %ctx.tenant_user_id, error = %e, "identity mirror refresh failed");
    }
    Ok(ctx)
}

// ---- /health ----

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub session: leadline_core::types::SessionStatus,
}

/// GET /health (unauthenticated).
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session: state.engine.chat().status(),
    })
}

// ---- /v1/messages ----

#[derive(Debug, Deserialize)]
pub struct PostMessageBody {
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    pub message_id: String,
    pub method: SendMethod,
    pub lead_id: String,
}

/// POST /v1/messages — outbound dispatch.
pub async fn post_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<PostMessageBody>,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    if body.lead_id.is_none() && body.account_id.is_none() {
        return bad_request("either lead_id or account_id is required");
    }
    if body.content.trim().is_empty() {
        return bad_request("content cannot be empty");
    }

    let request = SendRequest {
        lead_id: body.lead_id,
        account_id: body.account_id,
        body: body.content,
    };
    match state.engine.send(&ctx, request).await {
        Ok(receipt) => Json(PostMessageResponse {
            message_id: receipt.message_id,
            method: receipt.method,
            lead_id: receipt.lead_id,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ---- /v1/connection ----

#[derive(Debug, Deserialize)]
pub struct PostConnectionBody {
    pub account_id: String,
    pub account_name: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub guild_name: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub connected: bool,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub last_synced_at: Option<String>,
    pub synced_members: i64,
    pub synced_channels: i64,
}

impl From<Connection> for ConnectionResponse {
    fn from(c: Connection) -> Self {
        Self {
            connected: c.is_active,
            guild_id: c.guild_id,
            guild_name: c.guild_name,
            last_synced_at: c.last_synced_at,
            synced_members: c.synced_members,
            synced_channels: c.synced_channels,
        }
    }
}

/// GET /v1/connection — the caller's connection status.
pub async fn get_connection(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match state.engine.connection_status(&ctx.tenant_user_id).await {
        Ok(Some(connection)) => Json(ConnectionResponse::from(connection)).into_response(),
        Ok(None) => Json(ConnectionResponse {
            connected: false,
            guild_id: None,
            guild_name: None,
            last_synced_at: None,
            synced_members: 0,
            synced_channels: 0,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/connection — create or refresh the caller's connection.
pub async fn post_connection(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<PostConnectionBody>,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let link = NewConnection {
        account_id: body.account_id,
        account_name: body.account_name,
        guild_id: body.guild_id,
        guild_name: body.guild_name,
        session_token: body.session_token,
    };
    match state.engine.upsert_connection(&ctx, link).await {
        Ok(connection) => Json(ConnectionResponse::from(connection)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /v1/connection — deactivate the caller's connection.
pub async fn delete_connection(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match state.engine.deactivate_connection(&ctx.tenant_user_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found("connection"),
        Err(e) => error_response(e),
    }
}

// ---- /v1/leads/{lead_id}/channel ----

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub channel: LeadChannel,
}

/// POST /v1/leads/{lead_id}/channel — idempotent provisioning.
pub async fn post_lead_channel(
    State(state): State<GatewayState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let lead = match leads::get_scoped(state.engine.db(), &lead_id, &ctx.company_id).await {
        Ok(Some(lead)) => lead,
        Ok(None) => return not_found("lead"),
        Err(e) => return error_response(e),
    };
    match state.engine.ensure_channel(&lead).await {
        Ok(channel) => Json(ChannelResponse { channel }).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ArchiveBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// DELETE /v1/leads/{lead_id}/channel — archive the active channel.
pub async fn delete_lead_channel(
    State(state): State<GatewayState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ArchiveBody>>,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match leads::get_scoped(state.engine.db(), &lead_id, &ctx.company_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("lead"),
        Err(e) => return error_response(e),
    }
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "closed".to_string());
    match state.engine.archive_channel(&lead_id, &reason).await {
        Ok(Some(channel)) => Json(ChannelResponse { channel }).into_response(),
        Ok(None) => not_found("active channel"),
        Err(e) => error_response(e),
    }
}

// ---- /v1/leads/{lead_id}/messages ----

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageRecord>,
}

/// GET /v1/leads/{lead_id}/messages — chronological history.
pub async fn get_lead_messages(
    State(state): State<GatewayState>,
    Path(lead_id): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match leads::get_scoped(state.engine.db(), &lead_id, &ctx.company_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("lead"),
        Err(e) => return error_response(e),
    }
    match messages::list_for_lead(state.engine.db(), &lead_id, &ctx.company_id, query.limit).await
    {
        Ok(list) => Json(MessageListResponse { messages: list }).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

/// POST /v1/leads/{lead_id}/read — clear the unread flag.
pub async fn post_lead_read(
    State(state): State<GatewayState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let ctx = match tenant_ctx(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    match messages::mark_read(state.engine.db(), &lead_id, &ctx.company_id).await {
        Ok(updated) => Json(MarkReadResponse { updated }).into_response(),
        Err(e) => error_response(e),
    }
}
