// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry: one chat platform link per tenant user.
//!
//! Guild bindings are never trusted from storage alone; every commit
//! and every inheritance decision re-validates live access through the
//! chat port, so a guild the bot was kicked from degrades gracefully
//! instead of poisoning the company.

use leadline_core::EngineError;
use leadline_core::types::{Connection, TenantContext, TenantUser, now_ts};
use leadline_storage::queries::{connections, tenant_users};
use tracing::{info, warn};

use crate::Engine;

/// Input for creating or refreshing a tenant user's connection.
#[derive(Debug, Clone)]
pub struct NewConnection {
    /// The tenant user's own chat platform account.
    pub account_id: String,
    pub account_name: String,
    /// Guild the caller wants to bind. `None` requests inheritance from
    /// the company's existing connections.
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub session_token: Option<String>,
}

impl Engine {
    /// Create or refresh the caller's connection.
    ///
    /// A company guild established by an earlier teammate connection
    /// always wins over the caller's own candidate, so every connector
    /// for a company lands in the same shared server. The candidate
    /// binds only when the company has no reachable guild yet. With no
    /// reachable guild at all the call fails with
    /// [`EngineError::ConnectionInaccessible`] carrying the
    /// re-authorization invite URL.
    pub async fn upsert_connection(
        &self,
        ctx: &TenantContext,
        link: NewConnection,
    ) -> Result<Connection, EngineError> {
        // Keep the identity mirror fresh; orphan checks depend on it.
        tenant_users::touch(
            &self.db,
            &TenantUser {
                id: ctx.tenant_user_id.clone(),
                company_id: ctx.company_id.clone(),
                display_name: Some(link.account_name.clone()),
                last_active_at: now_ts(),
            },
        )
        .await?;

        let inherited = self
            .resolve_company_guild(&ctx.company_id, Some(&ctx.tenant_user_id))
            .await?;
        let committed = match inherited {
            Some((guild_id, guild_name)) => {
                if let Some(candidate) = &link.guild_id
                    && *candidate != guild_id
                {
                    info!(
                        tenant_user_id = %ctx.tenant_user_id,
                        candidate = %candidate,
                        company_guild = %guild_id,
                        "candidate guild superseded by established company guild"
                    );
                }
                Some((guild_id, guild_name))
            }
            None => match &link.guild_id {
                Some(candidate) if self.chat.has_guild_access(candidate).await? => {
                    Some((candidate.clone(), link.guild_name.clone()))
                }
                _ => None,
            },
        };

        let Some((guild_id, guild_name)) = committed else {
            return Err(EngineError::ConnectionInaccessible {
                guild: link.guild_name,
                invite_url: self.chat.invite_url(),
            });
        };

        // Sync counters come from live guild data; a failed count never
        // blocks the connect.
        let counts = match self.chat.guild_counts(&guild_id).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(guild_id = %guild_id, error = %e, "guild count sync failed");
                Default::default()
            }
        };

        let now = now_ts();
        let connection = Connection {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: ctx.tenant_user_id.clone(),
            company_id: ctx.company_id.clone(),
            account_id: link.account_id,
            account_name: link.account_name,
            guild_id: Some(guild_id.clone()),
            guild_name,
            session_token: link.session_token,
            is_active: true,
            connected_at: now.clone(),
            last_synced_at: Some(now),
            synced_members: counts.members,
            synced_channels: counts.channels,
        };
        connections::upsert(&self.db, &connection).await?;

        info!(
            tenant_user_id = %ctx.tenant_user_id,
            guild_id = %guild_id,
            "connection committed"
        );

        // The upsert preserves id and connected_at on refresh; re-read
        // so callers see the stored row.
        connections::get_by_tenant_user(&self.db, &ctx.tenant_user_id)
            .await?
            .ok_or_else(|| EngineError::Internal("connection vanished after upsert".into()))
    }

    /// The company guild to inherit: the guild of the earliest active
    /// connection (excluding `excluding_user`) that the bot can still
    /// reach. `None` when the company has no usable guild.
    pub async fn resolve_company_guild(
        &self,
        company_id: &str,
        excluding_user: Option<&str>,
    ) -> Result<Option<(String, Option<String>)>, EngineError> {
        let Some(other) =
            connections::earliest_active_for_company(&self.db, company_id, excluding_user).await?
        else {
            return Ok(None);
        };
        let Some(guild_id) = other.guild_id else {
            return Ok(None);
        };
        if self.chat.has_guild_access(&guild_id).await? {
            Ok(Some((guild_id, other.guild_name)))
        } else {
            warn!(
                company_id,
                guild_id = %guild_id,
                "company guild no longer accessible, not inheriting"
            );
            Ok(None)
        }
    }

    /// Disconnect a tenant user: the guild binding and token are
    /// cleared, the row is kept for history.
    pub async fn deactivate_connection(&self, tenant_user_id: &str) -> Result<bool, EngineError> {
        let affected = connections::deactivate(&self.db, tenant_user_id).await?;
        if affected {
            info!(tenant_user_id, "connection deactivated");
        }
        Ok(affected)
    }

    /// The caller's connection row, for the status endpoint.
    pub async fn connection_status(
        &self,
        tenant_user_id: &str,
    ) -> Result<Option<Connection>, EngineError> {
        connections::get_by_tenant_user(&self.db, tenant_user_id).await
    }
}
