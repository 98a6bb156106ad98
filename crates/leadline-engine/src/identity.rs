// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity resolution for inbound chat events.
//!
//! Maps a normalized event to the owning tenant and its lead, creating
//! the lead on first contact. Unresolvable events are dropped with a
//! log line; resolution failures never surface to platform sessions.

use leadline_core::EngineError;
use leadline_core::types::{ChatEvent, Connection, Lead, TenantContext, now_ts};
use leadline_storage::queries::{connections, leads, tenant_users};
use tracing::{debug, info, warn};

use crate::Engine;

/// Channel kinds recorded on leads.
pub const KIND_GUILD: &str = "discord_guild";
pub const KIND_DM: &str = "discord_dm";

/// A successfully resolved inbound event.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub ctx: TenantContext,
    pub lead: Lead,
    /// Whether this event created the lead.
    pub created: bool,
}

impl Engine {
    /// Resolve the tenant and lead for an inbound event.
    ///
    /// Returns `None` when the event cannot be attributed (no usable
    /// connection) or must not become a lead (the sender owns a
    /// connection, so they are a teammate, not a prospect).
    pub async fn resolve_identity(
        &self,
        event: &ChatEvent,
    ) -> Result<Option<ResolvedIdentity>, EngineError> {
        if connections::active_by_account(&self.db, &event.author_id)
            .await?
            .is_some()
        {
            debug!(author_id = %event.author_id, "sender owns a connection, not a lead");
            return Ok(None);
        }

        let connection = match &event.guild_id {
            Some(guild_id) => self.resolve_guild_connection(guild_id).await?,
            None => self.resolve_dm_connection().await?,
        };
        let Some(connection) = connection else {
            warn!(
                external_id = %event.external_id,
                direct = event.is_direct(),
                "dropping event: no tenant connection resolves it"
            );
            return Ok(None);
        };

        let ctx = TenantContext {
            tenant_user_id: connection.tenant_user_id.clone(),
            company_id: connection.company_id.clone(),
        };

        let (lead, created) = self.find_or_create_lead(&ctx, event).await?;
        Ok(Some(ResolvedIdentity { ctx, lead, created }))
    }

    /// Guild events route to the most recently connected active
    /// connection for that guild, provided its tenant user still exists
    /// in the identity mirror (orphaned connections are skipped).
    async fn resolve_guild_connection(
        &self,
        guild_id: &str,
    ) -> Result<Option<Connection>, EngineError> {
        let Some(connection) = connections::latest_active_for_guild(&self.db, guild_id).await?
        else {
            return Ok(None);
        };
        if !tenant_users::exists(&self.db, &connection.tenant_user_id).await? {
            warn!(
                tenant_user_id = %connection.tenant_user_id,
                guild_id,
                "connection references an unknown tenant user, treating as unconnected"
            );
            return Ok(None);
        }
        Ok(Some(connection))
    }

    /// DMs route to the earliest active connection. When none exists
    /// the route is auto-repaired by binding a fresh connection to the
    /// most recently active tenant user, so first-contact DMs are not
    /// lost while someone re-links.
    async fn resolve_dm_connection(&self) -> Result<Option<Connection>, EngineError> {
        if let Some(connection) = connections::earliest_active(&self.db).await? {
            return Ok(Some(connection));
        }

        let Some(user) = tenant_users::most_recently_active(&self.db).await? else {
            return Ok(None);
        };
        warn!(
            tenant_user_id = %user.id,
            "no active connection for DM route, auto-binding most recently active tenant user"
        );

        let bot_account = self.chat.bot_account_id().await?;
        let now = now_ts();
        let connection = Connection {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: user.id.clone(),
            company_id: user.company_id.clone(),
            account_id: bot_account,
            account_name: user.display_name.unwrap_or_else(|| user.id.clone()),
            guild_id: None,
            guild_name: None,
            session_token: None,
            is_active: true,
            connected_at: now.clone(),
            last_synced_at: Some(now),
            synced_members: 0,
            synced_channels: 0,
        };
        connections::upsert(&self.db, &connection).await?;
        connections::get_by_tenant_user(&self.db, &user.id).await
    }

    /// Find the company's lead for the event author, creating it on
    /// first contact. Creation races collapse onto the winning row via
    /// the per-company unique constraint.
    async fn find_or_create_lead(
        &self,
        ctx: &TenantContext,
        event: &ChatEvent,
    ) -> Result<(Lead, bool), EngineError> {
        if let Some(lead) = leads::find_by_account(&self.db, &ctx.company_id, &event.author_id)
            .await?
        {
            return Ok((lead, false));
        }

        let candidate = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: ctx.company_id.clone(),
            tenant_user_id: ctx.tenant_user_id.clone(),
            account_id: Some(event.author_id.clone()),
            account_name: Some(event.author_name.clone()),
            thread_id: None,
            invite_sent: false,
            joined_thread: false,
            commerce_member_id: None,
            commerce_channel_id: None,
            status: "new".to_string(),
            channel_kind: if event.is_direct() { KIND_DM } else { KIND_GUILD }.to_string(),
            last_chat_message_at: None,
            last_commerce_message_at: None,
            created_at: now_ts(),
        };
        let (lead, created) = leads::insert_or_fetch(&self.db, &candidate).await?;
        if created {
            info!(lead_id = %lead.id, company_id = %ctx.company_id, "lead created on first contact");
            if let Err(e) = self.notifier.lead_created(&lead).await {
                warn!(lead_id = %lead.id, error = %e, "lead-created notification failed");
            }
        }
        Ok((lead, created))
    }
}
