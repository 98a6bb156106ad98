// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commerce platform support-feed client.
//!
//! Implements [`CommerceFeed`] over the platform's REST API. The feed is
//! poll-only; the reconciliation poller in the engine drives it and the
//! idempotent message store absorbs anything fetched twice.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use leadline_config::model::CommerceConfig;
use leadline_core::EngineError;
use leadline_core::traits::CommerceFeed;
use leadline_core::types::CommerceMessage;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    data: Vec<FeedPost>,
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    id: String,
    #[serde(default)]
    content: String,
    user: Option<FeedUser>,
    created_at: Timestamp,
}

#[derive(Debug, Deserialize)]
struct FeedUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
}

/// The feed reports epoch seconds for older posts and RFC 3339 for
/// newer ones; both normalize to the storage timestamp format.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Epoch(i64),
    Rfc3339(String),
}

impl Timestamp {
    fn normalize(&self) -> Result<String, EngineError> {
        match self {
            Timestamp::Epoch(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
                .ok_or_else(|| EngineError::Platform {
                    message: format!("feed timestamp out of range: {secs}"),
                    source: None,
                }),
            Timestamp::Rfc3339(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true))
                .map_err(|e| EngineError::Platform {
                    message: format!("malformed feed timestamp {s:?}: {e}"),
                    source: Some(Box::new(e)),
                }),
        }
    }
}

/// REST client for the commerce support feed.
#[derive(Debug, Clone)]
pub struct CommerceClient {
    client: reqwest::Client,
    base_url: String,
}

impl CommerceClient {
    /// Builds a client from config. Requires `config.api_key`.
    pub fn new(config: &CommerceConfig) -> Result<Self, EngineError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| EngineError::Config("commerce.api_key is required".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| EngineError::Config(format!("invalid commerce api key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Platform {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CommerceFeed for CommerceClient {
    async fn fetch_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<CommerceMessage>, EngineError> {
        let mut request = self
            .client
            .get(format!("{}/feeds/{channel_id}/messages", self.base_url));
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let response = request.send().await.map_err(|e| EngineError::Platform {
            message: format!("commerce feed request failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Platform {
                message: format!("commerce feed returned {status}: {body}"),
                source: None,
            });
        }

        let page: FeedPage = response.json().await.map_err(|e| EngineError::Platform {
            message: format!("failed to parse feed response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut messages = Vec::with_capacity(page.data.len());
        for post in page.data {
            let timestamp = post.created_at.normalize()?;
            messages.push(CommerceMessage {
                external_id: post.id,
                channel_id: channel_id.to_string(),
                author_id: post.user.as_ref().map(|u| u.id.clone()),
                author_name: post.user.and_then(|u| u.username),
                body: post.content,
                timestamp,
            });
        }
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        debug!(channel_id, count = messages.len(), "fetched commerce feed page");
        Ok(messages)
    }
}
