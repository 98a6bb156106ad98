// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait for the external chat platform (guilds, threads, DMs).

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{GuildCounts, GuildInfo, SessionStatus};

/// Operations the routing engine needs from the chat platform.
///
/// One shared session backs all calls; reads may run concurrently, and
/// every method is a blocking network call from the caller's perspective
/// (implementations carry their own timeouts).
#[async_trait]
pub trait ChatPort: Send + Sync + 'static {
    /// Point-in-time session state. Dispatch refuses sends unless
    /// [`SessionStatus::Connected`].
    fn status(&self) -> SessionStatus;

    /// Authorization URL a tenant can use to (re-)invite the integration
    /// into a guild. Carried on `ConnectionInaccessible` errors.
    fn invite_url(&self) -> String;

    /// The integration's own platform account id, used as the author of
    /// outbound messages.
    async fn bot_account_id(&self) -> Result<String, EngineError>;

    /// Whether the integration currently belongs to the given guild.
    async fn has_guild_access(&self, guild_id: &str) -> Result<bool, EngineError>;

    /// Guilds the integration currently belongs to.
    async fn accessible_guilds(&self) -> Result<Vec<GuildInfo>, EngineError>;

    /// Member/channel counts for a guild, refreshed during connection sync.
    async fn guild_counts(&self, guild_id: &str) -> Result<GuildCounts, EngineError>;

    /// Returns the id of the shared intake channel with the given name,
    /// creating it when absent.
    async fn find_or_create_intake_channel(
        &self,
        guild_id: &str,
        name: &str,
    ) -> Result<String, EngineError>;

    /// Creates a private thread inside the given channel and returns its id.
    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<String, EngineError>;

    /// Adds a platform account to a thread.
    async fn add_thread_member(
        &self,
        thread_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError>;

    /// Archives a thread on the platform. Best-effort from the engine's
    /// perspective; local state stays authoritative.
    async fn archive_thread(&self, thread_id: &str) -> Result<(), EngineError>;

    /// Sends a message into a channel or thread; returns the platform
    /// message id.
    async fn send_to_channel(&self, channel_id: &str, body: &str) -> Result<String, EngineError>;

    /// Sends a direct message to an account; returns the DM channel id
    /// and the platform message id.
    async fn send_direct(
        &self,
        account_id: &str,
        body: &str,
    ) -> Result<(String, String), EngineError>;
}
