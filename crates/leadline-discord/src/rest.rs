// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Discord REST API.
//!
//! Provides [`DiscordRest`] which handles bot authentication and the
//! guild/channel/thread/DM endpoints the routing engine needs. Platform
//! error codes are translated into the engine's failure taxonomy here so
//! nothing above this layer ever sees a raw Discord payload.

use std::time::Duration;

use leadline_core::EngineError;
use leadline_core::types::{GuildCounts, GuildInfo};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

// Discord JSON error codes the engine cares about.
const CODE_UNKNOWN_USER: i64 = 10013;
const CODE_MISSING_ACCESS: i64 = 50001;
const CODE_CANNOT_DM_USER: i64 = 50007;

// Guild channel types.
const CHANNEL_GUILD_TEXT: u8 = 0;
const CHANNEL_PRIVATE_THREAD: u8 = 12;

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct GuildBody {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GuildCountsBody {
    approximate_member_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChannelBody {
    id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

/// Authenticated Discord REST client.
///
/// Cheap to clone; connection pooling lives in the inner reqwest client.
#[derive(Debug, Clone)]
pub struct DiscordRest {
    client: reqwest::Client,
    base_url: String,
    invite_url: String,
    timeout: Duration,
}

impl DiscordRest {
    /// Builds a client for the given bot token.
    ///
    /// `invite_url` is the re-authorization URL attached to access errors.
    pub fn new(
        bot_token: &str,
        api_base: &str,
        invite_url: String,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bot {bot_token}"))
                .map_err(|e| EngineError::Config(format!("invalid bot token: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Platform {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: api_base.trim_end_matches('/').to_string(),
            invite_url,
            timeout,
        })
    }

    /// The integration's own account: `(id, username)`.
    pub async fn current_user(&self) -> Result<(String, String), EngineError> {
        let user: UserBody = self.get("/users/@me").await?;
        Ok((user.id, user.username))
    }

    /// Guilds the bot currently belongs to.
    pub async fn current_guilds(&self) -> Result<Vec<GuildInfo>, EngineError> {
        let guilds: Vec<GuildBody> = self.get("/users/@me/guilds").await?;
        Ok(guilds
            .into_iter()
            .map(|g| GuildInfo { id: g.id, name: g.name })
            .collect())
    }

    /// Approximate member count plus exact channel count for a guild.
    pub async fn guild_counts(&self, guild_id: &str) -> Result<GuildCounts, EngineError> {
        let counts: GuildCountsBody = self
            .get(&format!("/guilds/{guild_id}?with_counts=true"))
            .await?;
        let channels: Vec<ChannelBody> = self.get(&format!("/guilds/{guild_id}/channels")).await?;
        Ok(GuildCounts {
            members: counts.approximate_member_count.unwrap_or(0),
            channels: channels.len() as i64,
        })
    }

    /// Finds a text channel by name in a guild.
    pub async fn find_text_channel(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<Option<String>, EngineError> {
        let channels: Vec<ChannelBody> = self.get(&format!("/guilds/{guild_id}/channels")).await?;
        Ok(channels
            .into_iter()
            .find(|c| c.kind == CHANNEL_GUILD_TEXT && c.name.as_deref() == Some(name))
            .map(|c| c.id))
    }

    /// Creates a text channel in a guild and returns its id.
    pub async fn create_text_channel(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        let channel: ChannelBody = self
            .post(
                &format!("/guilds/{guild_id}/channels"),
                &json!({ "name": name, "type": CHANNEL_GUILD_TEXT }),
            )
            .await?;
        debug!(guild_id, channel_id = %channel.id, "created intake channel");
        Ok(channel.id)
    }

    /// Creates an invitable private thread inside a channel.
    pub async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        let thread: ChannelBody = self
            .post(
                &format!("/channels/{channel_id}/threads"),
                &json!({ "name": name, "type": CHANNEL_PRIVATE_THREAD, "invitable": true }),
            )
            .await?;
        Ok(thread.id)
    }

    /// Adds an account to a thread.
    pub async fn add_thread_member(
        &self,
        thread_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError> {
        let response = self
            .client
            .put(format!(
                "{}/channels/{thread_id}/thread-members/{account_id}",
                self.base_url
            ))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.map_api_error(response, Some(account_id)).await)
    }

    /// Archives a thread.
    pub async fn archive_thread(&self, thread_id: &str) -> Result<(), EngineError> {
        let response = self
            .client
            .patch(format!("{}/channels/{thread_id}", self.base_url))
            .json(&json!({ "archived": true, "locked": false }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.map_api_error(response, None).await)
    }

    /// Opens (or reuses) the DM channel with an account and returns its id.
    pub async fn create_dm(&self, account_id: &str) -> Result<String, EngineError> {
        let response = self
            .client
            .post(format!("{}/users/@me/channels", self.base_url))
            .json(&json!({ "recipient_id": account_id }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if response.status().is_success() {
            let channel: ChannelBody = parse_body(response).await?;
            return Ok(channel.id);
        }
        Err(self.map_api_error(response, Some(account_id)).await)
    }

    /// Posts a message into a channel or thread; returns the message id.
    pub async fn send_message(&self, channel_id: &str, body: &str) -> Result<String, EngineError> {
        let message: MessageBody = self
            .post(
                &format!("/channels/{channel_id}/messages"),
                &json!({ "content": body }),
            )
            .await?;
        Ok(message.id)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if response.status().is_success() {
            return parse_body(response).await;
        }
        Err(self.map_api_error(response, None).await)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, EngineError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if response.status().is_success() {
            return parse_body(response).await;
        }
        Err(self.map_api_error(response, None).await)
    }

    fn map_send_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout {
                duration: self.timeout,
            }
        } else {
            EngineError::Platform {
                message: format!("HTTP request failed: {err}"),
                source: Some(Box::new(err)),
            }
        }
    }

    /// Translates a non-success response into the engine taxonomy.
    ///
    /// `account_id` is supplied by account-addressed calls so unknown-user
    /// responses carry the id the caller asked about.
    async fn map_api_error(
        &self,
        response: reqwest::Response,
        account_id: Option<&str>,
    ) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
        let code = parsed.as_ref().and_then(|e| e.code);
        let message = parsed
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {status}"));

        match code {
            Some(CODE_CANNOT_DM_USER) => EngineError::DeliveryBlocked { reason: message },
            Some(CODE_UNKNOWN_USER) => EngineError::AccountNotFound {
                account_id: account_id.unwrap_or("unknown").to_string(),
            },
            Some(CODE_MISSING_ACCESS) => EngineError::ConnectionInaccessible {
                guild: None,
                invite_url: self.invite_url.clone(),
            },
            _ if status == StatusCode::FORBIDDEN => EngineError::ConnectionInaccessible {
                guild: None,
                invite_url: self.invite_url.clone(),
            },
            _ if status == StatusCode::NOT_FOUND && account_id.is_some() => {
                EngineError::AccountNotFound {
                    account_id: account_id.unwrap_or("unknown").to_string(),
                }
            }
            _ => EngineError::Platform {
                message: format!("Discord API returned {status}: {message}"),
                source: None,
            },
        }
    }
}

async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EngineError> {
    let body = response.text().await.map_err(|e| EngineError::Platform {
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| EngineError::Platform {
        message: format!("failed to parse API response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> DiscordRest {
        DiscordRest::new(
            "test-token",
            base_url,
            "https://example.test/invite".into(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn current_user_sends_bot_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .and(header("authorization", "Bot test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "bot-1", "username": "leadline"
            })))
            .mount(&server)
            .await;

        let (id, name) = test_client(&server.uri()).current_user().await.unwrap();
        assert_eq!(id, "bot-1");
        assert_eq!(name, "leadline");
    }

    #[tokio::test]
    async fn dm_refusal_maps_to_delivery_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/chan-1/messages"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "code": 50007, "message": "Cannot send messages to this user"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .send_message("chan-1", "hi")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "delivery_blocked");
    }

    #[tokio::test]
    async fn missing_access_carries_invite_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/g1/channels"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "code": 50001, "message": "Missing Access"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .find_text_channel("g1", "leads-intake")
            .await
            .unwrap_err();
        match err {
            EngineError::ConnectionInaccessible { invite_url, .. } => {
                assert_eq!(invite_url, "https://example.test/invite");
            }
            other => panic!("expected ConnectionInaccessible, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_user_maps_to_account_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .and(body_partial_json(serde_json::json!({ "recipient_id": "acct-9" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 10013, "message": "Unknown User"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).create_dm("acct-9").await.unwrap_err();
        match err {
            EngineError::AccountNotFound { account_id } => assert_eq!(account_id, "acct-9"),
            other => panic!("expected AccountNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_text_channel_matches_name_and_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/g1/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "c1", "name": "general", "type": 0 },
                { "id": "c2", "name": "leads-intake", "type": 2 },
                { "id": "c3", "name": "leads-intake", "type": 0 }
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let found = client.find_text_channel("g1", "leads-intake").await.unwrap();
        assert_eq!(found.as_deref(), Some("c3"));
        let missing = client.find_text_channel("g1", "support").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn create_private_thread_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c3/threads"))
            .and(body_partial_json(serde_json::json!({ "type": 12, "invitable": true })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "t1", "name": "chat-prospect", "type": 12
            })))
            .mount(&server)
            .await;

        let id = test_client(&server.uri())
            .create_private_thread("c3", "chat-prospect")
            .await
            .unwrap();
        assert_eq!(id, "t1");
    }

    #[tokio::test]
    async fn unexpected_error_is_platform_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/@me/guilds"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).current_guilds().await.unwrap_err();
        assert_eq!(err.kind(), "platform_error");
    }
}
