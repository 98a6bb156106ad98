// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface tests driven through the router with `tower::ServiceExt`,
//! no socket binding. Each test gets an isolated engine over temp SQLite
//! with mock platform ports.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use leadline_core::types::SessionStatus;
use leadline_engine::{Engine, EngineSettings};
use leadline_gateway::{AuthConfig, GatewayState, NotifyHub, build_router};
use leadline_storage::Database;
use leadline_test_utils::MockChatPort;
use tower::util::ServiceExt;

const TOKEN: &str = "test-token";

struct Fixture {
    app: Router,
    chat: Arc<MockChatPort>,
    _dir: tempfile::TempDir,
}

async fn fixture(guilds: &[(&str, &str)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gateway.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    let chat = Arc::new(MockChatPort::connected(guilds));
    let hub = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(
        db,
        chat.clone(),
        hub.clone(),
        EngineSettings {
            intake_channel_name: "leads-intake".into(),
            welcome_notice: "Hi! A member of our team will be with you shortly.".into(),
        },
    ));
    let app = build_router(GatewayState {
        engine,
        hub,
        auth: AuthConfig {
            bearer_token: Some(TOKEN.into()),
        },
    });
    Fixture {
        app,
        chat,
        _dir: dir,
    }
}

fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header("x-tenant-user", "user-1")
        .header("x-company-id", "co-1");
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn connection_body() -> serde_json::Value {
    serde_json::json!({
        "account_id": "acct-1",
        "account_name": "Teammate One",
        "guild_id": "guild-1",
        "guild_name": "Acme Community",
        "session_token": "sess-tok"
    })
}

#[tokio::test]
async fn health_is_public() {
    let fx = fixture(&[]).await;
    let response = fx
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session"], "connected");
}

#[tokio::test]
async fn api_routes_reject_missing_and_wrong_tokens() {
    let fx = fixture(&[]).await;

    let bare = Request::get("/v1/connection")
        .header("x-tenant-user", "user-1")
        .header("x-company-id", "co-1")
        .body(Body::empty())
        .unwrap();
    let response = fx.app.clone().oneshot(bare).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::get("/v1/connection")
        .header(header::AUTHORIZATION, "Bearer nope")
        .header("x-tenant-user", "user-1")
        .header("x-company-id", "co-1")
        .body(Body::empty())
        .unwrap();
    let response = fx.app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_tenant_headers_are_a_bad_request() {
    let fx = fixture(&[]).await;
    let req = Request::get("/v1/connection")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let response = fx.app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connection_lifecycle_round_trips() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;

    let response = fx
        .app
        .clone()
        .oneshot(request("GET", "/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["connected"], false);

    let response = fx
        .app
        .clone()
        .oneshot(request("POST", "/v1/connection", Some(connection_body())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["guild_id"], "guild-1");

    let response = fx
        .app
        .clone()
        .oneshot(request("DELETE", "/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = fx
        .app
        .oneshot(request("GET", "/v1/connection", None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["connected"], false);
}

#[tokio::test]
async fn unreachable_guild_maps_to_conflict_with_invite() {
    let fx = fixture(&[]).await;
    let response = fx
        .app
        .oneshot(request("POST", "/v1/connection", Some(connection_body())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "connection_inaccessible");
    assert!(body["invite_url"].as_str().unwrap().starts_with("https://"));
}

#[tokio::test]
async fn dm_send_creates_lead_and_serves_history() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"account_id": "lead-acct", "content": "hello there"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["method"], "dm");
    let lead_id = body["lead_id"].as_str().unwrap().to_string();
    assert_eq!(fx.chat.sent_directs().len(), 1);

    let response = fx
        .app
        .clone()
        .oneshot(request("GET", &format!("/v1/leads/{lead_id}/messages"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "hello there");
    assert_eq!(messages[0]["direction"], "outgoing");

    let response = fx
        .app
        .oneshot(request("POST", &format!("/v1/leads/{lead_id}/read"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // The outbound record is born read, so nothing flips.
    assert_eq!(json_body(response).await["updated"], 0);
}

#[tokio::test]
async fn send_while_disconnected_is_service_unavailable() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;
    fx.chat.set_status(SessionStatus::Disconnected);

    let response = fx
        .app
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"account_id": "lead-acct", "content": "hi"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["kind"], "platform_unavailable");
}

#[tokio::test]
async fn message_to_unknown_lead_is_not_found() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;
    let response = fx
        .app
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"lead_id": "no-such-lead", "content": "hi"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["kind"], "lead_not_found");
}

#[tokio::test]
async fn message_without_target_or_content_is_rejected() {
    let fx = fixture(&[]).await;

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"content": "hi"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = fx
        .app
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"lead_id": "l1", "content": "   "})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn channel_endpoints_provision_and_archive() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;

    fx.app
        .clone()
        .oneshot(request("POST", "/v1/connection", Some(connection_body())))
        .await
        .unwrap();

    // A DM send materializes a lead to provision a channel for.
    let response = fx
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"account_id": "lead-acct", "content": "hi"})),
        ))
        .await
        .unwrap();
    let lead_id = json_body(response).await["lead_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = fx
        .app
        .clone()
        .oneshot(request("POST", &format!("/v1/leads/{lead_id}/channel"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let thread_id = body["channel"]["thread_id"].as_str().unwrap().to_string();
    assert_eq!(body["channel"]["is_active"], true);

    // Provisioning again returns the same channel.
    let response = fx
        .app
        .clone()
        .oneshot(request("POST", &format!("/v1/leads/{lead_id}/channel"), None))
        .await
        .unwrap();
    assert_eq!(
        json_body(response).await["channel"]["thread_id"],
        thread_id.as_str()
    );

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/v1/leads/{lead_id}/channel"),
            Some(serde_json::json!({"reason": "resolved"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["channel"]["is_active"], false);
    assert_eq!(fx.chat.archived_threads(), vec![thread_id]);

    // No active channel left to archive.
    let response = fx
        .app
        .oneshot(request(
            "DELETE",
            &format!("/v1/leads/{lead_id}/channel"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lead_routes_are_company_scoped() {
    let fx = fixture(&[("guild-1", "Acme Community")]).await;

    let response = fx
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/messages",
            Some(serde_json::json!({"account_id": "lead-acct", "content": "hi"})),
        ))
        .await
        .unwrap();
    let lead_id = json_body(response).await["lead_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Same lead id, different company header.
    let req = Request::get(format!("/v1/leads/{lead_id}/messages"))
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header("x-tenant-user", "user-9")
        .header("x-company-id", "co-other")
        .body(Body::empty())
        .unwrap();
    let response = fx.app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
