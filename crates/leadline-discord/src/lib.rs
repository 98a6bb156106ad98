// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord chat platform adapter for the Leadline routing engine.
//!
//! Implements [`ChatPort`] over the Discord REST API and maintains the
//! gateway websocket session that feeds inbound [`ChatEvent`]s to the
//! engine.

pub mod events;
pub mod rest;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use leadline_config::model::DiscordConfig;
use leadline_core::EngineError;
use leadline_core::traits::ChatPort;
use leadline_core::types::{ChatEvent, GuildCounts, GuildInfo, SessionStatus};
use tokio::sync::{OnceCell, mpsc};
use tracing::info;

use crate::rest::DiscordRest;

// Manage channels/threads, send messages, read history.
const INVITE_PERMISSIONS: u64 = 326_417_516_544;

/// Builds the bot authorization URL for a Discord application.
pub fn build_invite_url(client_id: Option<&str>) -> String {
    match client_id {
        Some(id) => format!(
            "https://discord.com/oauth2/authorize?client_id={id}&scope=bot&permissions={INVITE_PERMISSIONS}"
        ),
        None => "https://discord.com/oauth2/authorize".to_string(),
    }
}

/// Discord-backed implementation of [`ChatPort`].
///
/// One instance is shared by the engine, the dispatcher, and the gateway
/// session task. REST calls are independent of session state; only the
/// caller decides whether a disconnected session matters.
#[derive(Debug)]
pub struct DiscordChannel {
    rest: DiscordRest,
    config: DiscordConfig,
    status: Arc<ArcSwap<SessionStatus>>,
    bot_id: OnceCell<String>,
}

impl DiscordChannel {
    /// Creates the adapter. Requires `config.bot_token` to be set.
    pub fn new(config: DiscordConfig) -> Result<Self, EngineError> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| EngineError::Config("discord.bot_token is required".into()))?;
        if token.is_empty() {
            return Err(EngineError::Config("discord.bot_token cannot be empty".into()));
        }

        let invite_url = build_invite_url(config.client_id.as_deref());
        let rest = DiscordRest::new(
            token,
            &config.api_base,
            invite_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            rest,
            config,
            status: Arc::new(ArcSwap::from_pointee(SessionStatus::Disconnected)),
            bot_id: OnceCell::new(),
        })
    }

    /// Spawns the gateway session task. Inbound events arrive on
    /// `events_tx`; the task stops when the receiver is dropped.
    pub fn start(&self, events_tx: mpsc::Sender<ChatEvent>) -> tokio::task::JoinHandle<()> {
        let gateway_url = self.config.gateway_url.clone();
        // Presence validated in new().
        let token = self.config.bot_token.clone().unwrap_or_default();
        let status = Arc::clone(&self.status);
        info!(gateway_url = %gateway_url, "starting chat gateway session");
        tokio::spawn(session::run_session(gateway_url, token, status, events_tx))
    }

    /// Direct access to the REST client, for status reporting.
    pub fn rest(&self) -> &DiscordRest {
        &self.rest
    }
}

#[async_trait]
impl ChatPort for DiscordChannel {
    fn status(&self) -> SessionStatus {
        **self.status.load()
    }

    fn invite_url(&self) -> String {
        build_invite_url(self.config.client_id.as_deref())
    }

    async fn bot_account_id(&self) -> Result<String, EngineError> {
        let id = self
            .bot_id
            .get_or_try_init(|| async {
                let (id, name) = self.rest.current_user().await?;
                info!(bot_id = %id, bot_name = %name, "resolved integration account");
                Ok::<_, EngineError>(id)
            })
            .await?;
        Ok(id.clone())
    }

    async fn has_guild_access(&self, guild_id: &str) -> Result<bool, EngineError> {
        let guilds = self.rest.current_guilds().await?;
        Ok(guilds.iter().any(|g| g.id == guild_id))
    }

    async fn accessible_guilds(&self) -> Result<Vec<GuildInfo>, EngineError> {
        self.rest.current_guilds().await
    }

    async fn guild_counts(&self, guild_id: &str) -> Result<GuildCounts, EngineError> {
        self.rest.guild_counts(guild_id).await
    }

    async fn find_or_create_intake_channel(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        if let Some(id) = self.rest.find_text_channel(guild_id, name).await? {
            return Ok(id);
        }
        self.rest.create_text_channel(guild_id, name).await
    }

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<String, EngineError> {
        self.rest.create_private_thread(channel_id, name).await
    }

    async fn add_thread_member(
        &self,
        thread_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError> {
        self.rest.add_thread_member(thread_id, account_id).await
    }

    async fn archive_thread(&self, thread_id: &str) -> Result<(), EngineError> {
        self.rest.archive_thread(thread_id).await
    }

    async fn send_to_channel(&self, channel_id: &str, body: &str) -> Result<String, EngineError> {
        self.rest.send_message(channel_id, body).await
    }

    async fn send_direct(
        &self,
        account_id: &str,
        body: &str,
    ) -> Result<(String, String), EngineError> {
        let dm_channel = self.rest.create_dm(account_id).await?;
        let message_id = self.rest.send_message(&dm_channel, body).await?;
        Ok((dm_channel, message_id))
    }
}
