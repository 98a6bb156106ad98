// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel lifecycle: one private thread per active lead.
//!
//! `ensure_channel` is idempotent and race-safe: the partial unique
//! index on active lead channels decides the winner, and the loser
//! adopts the winning row while archiving its own orphaned thread on
//! the platform. Local state is always authoritative; external archive
//! calls are best-effort.

use leadline_core::EngineError;
use leadline_core::types::{Connection, Lead, LeadChannel, now_ts};
use leadline_storage::queries::channels::{self, ChannelInsert};
use leadline_storage::queries::{connections, leads};
use tracing::{debug, info, warn};

use crate::Engine;

const THREAD_NAME_MAX: usize = 80;
const SUFFIX_LEN: usize = 5; // "-NNNN"

/// Normalizes a lead name into a platform-safe thread name:
/// lowercase, alphanumeric runs joined by single dashes, bounded length.
pub fn sanitize_thread_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut dash_pending = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if dash_pending && !name.is_empty() {
                name.push('-');
            }
            dash_pending = false;
            name.extend(c.to_lowercase());
        } else {
            dash_pending = true;
        }
    }
    if name.is_empty() {
        name.push_str("lead");
    }
    truncate_chars(&name, THREAD_NAME_MAX)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

impl Engine {
    /// Returns the lead's active channel, provisioning it when absent.
    ///
    /// Safe to call concurrently for the same lead: exactly one channel
    /// row survives, and every caller gets it.
    pub async fn ensure_channel(&self, lead: &Lead) -> Result<LeadChannel, EngineError> {
        if let Some(existing) = channels::active_for_lead(&self.db, &lead.id).await? {
            if lead.thread_id.as_deref() != Some(existing.thread_id.as_str()) {
                leads::set_thread(&self.db, &lead.id, &existing.thread_id, &lead.channel_kind)
                    .await?;
            }
            return Ok(existing);
        }

        let connection = self.routing_connection(lead).await?;
        let Some(guild_id) = connection.guild_id.clone() else {
            return Err(EngineError::ConnectionInaccessible {
                guild: None,
                invite_url: self.chat.invite_url(),
            });
        };
        if !self.chat.has_guild_access(&guild_id).await? {
            return Err(EngineError::ConnectionInaccessible {
                guild: connection.guild_name.clone(),
                invite_url: self.chat.invite_url(),
            });
        }

        let intake = self
            .chat
            .find_or_create_intake_channel(&guild_id, &self.settings.intake_channel_name)
            .await?;

        let thread_name = self.unique_thread_name(&guild_id, lead).await?;
        let thread_id = self.chat.create_private_thread(&intake, &thread_name).await?;

        let candidate = LeadChannel {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: connection.tenant_user_id.clone(),
            company_id: lead.company_id.clone(),
            lead_id: lead.id.clone(),
            guild_id,
            thread_id: thread_id.clone(),
            thread_name,
            account_id: lead.account_id.clone(),
            is_active: true,
            message_count: 0,
            created_at: now_ts(),
            last_message_at: None,
            archived_reason: None,
        };

        let channel = match channels::insert_active(&self.db, &candidate).await? {
            ChannelInsert::Created(channel) => {
                info!(lead_id = %lead.id, thread_id = %channel.thread_id, "lead channel provisioned");
                channel
            }
            ChannelInsert::Lost(winner) => {
                // Concurrent provisioning: adopt the winner and clean up
                // the thread we just created for nothing.
                debug!(
                    lead_id = %lead.id,
                    winner_thread = %winner.thread_id,
                    "recovered from concurrent channel creation"
                );
                if let Err(e) = self.chat.archive_thread(&thread_id).await {
                    warn!(thread_id = %thread_id, error = %e, "failed to archive orphaned thread");
                }
                winner
            }
        };

        leads::set_thread(&self.db, &lead.id, &channel.thread_id, &lead.channel_kind).await?;
        self.invite_lead_if_needed(lead, &channel).await;
        Ok(channel)
    }

    /// Archive the lead's active channel. Local state flips first; the
    /// platform archive is best-effort.
    pub async fn archive_channel(
        &self,
        lead_id: &str,
        reason: &str,
    ) -> Result<Option<LeadChannel>, EngineError> {
        let Some(archived) = channels::archive(&self.db, lead_id, reason).await? else {
            return Ok(None);
        };
        info!(lead_id, thread_id = %archived.thread_id, reason, "lead channel archived");
        if let Err(e) = self.chat.archive_thread(&archived.thread_id).await {
            warn!(thread_id = %archived.thread_id, error = %e, "platform archive failed");
        }
        Ok(Some(archived))
    }

    /// Pulls the lead's prospect into the thread and posts the welcome
    /// notice. Entirely best-effort: a prospect with closed invites just
    /// stays out until they join on their own.
    async fn invite_lead_if_needed(&self, lead: &Lead, channel: &LeadChannel) {
        if lead.invite_sent {
            return;
        }
        let Some(account_id) = lead.account_id.as_deref() else {
            return;
        };
        match self.chat.add_thread_member(&channel.thread_id, account_id).await {
            Ok(()) => {
                if let Err(e) = self
                    .chat
                    .send_to_channel(&channel.thread_id, &self.settings.welcome_notice)
                    .await
                {
                    warn!(thread_id = %channel.thread_id, error = %e, "welcome notice failed");
                }
                if let Err(e) = leads::mark_invited(&self.db, &lead.id).await {
                    warn!(lead_id = %lead.id, error = %e, "failed to record invite");
                }
            }
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "thread invite failed");
            }
        }
    }

    /// The connection that routes this lead: the owning tenant user's
    /// active connection when it still has a guild, else the company's
    /// earliest active one.
    async fn routing_connection(&self, lead: &Lead) -> Result<Connection, EngineError> {
        if let Some(own) = connections::get_by_tenant_user(&self.db, &lead.tenant_user_id).await? {
            if own.is_active && own.guild_id.is_some() {
                return Ok(own);
            }
        }
        connections::earliest_active_for_company(&self.db, &lead.company_id, None)
            .await?
            .ok_or_else(|| EngineError::ConnectionInaccessible {
                guild: None,
                invite_url: self.chat.invite_url(),
            })
    }

    /// Thread name from the lead's display name, deduplicated against
    /// active channels in the guild with a numeric suffix.
    async fn unique_thread_name(&self, guild_id: &str, lead: &Lead) -> Result<String, EngineError> {
        let raw = lead
            .account_name
            .as_deref()
            .or(lead.account_id.as_deref())
            .unwrap_or(lead.id.as_str());
        let base = sanitize_thread_name(raw);
        if !channels::thread_name_taken(&self.db, guild_id, &base).await? {
            return Ok(base);
        }
        let stem = truncate_chars(&base, THREAD_NAME_MAX - SUFFIX_LEN);
        let suffix = uuid::Uuid::new_v4().as_u128() % 10_000;
        Ok(format!("{stem}-{suffix:04}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_and_lowercases() {
        assert_eq!(sanitize_thread_name("Ada Lovelace!!"), "ada-lovelace");
        assert_eq!(sanitize_thread_name("  --weird__name--  "), "weird-name");
        assert_eq!(sanitize_thread_name("§§§"), "lead");
    }

    #[test]
    fn sanitize_bounds_length() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_thread_name(&long).chars().count(), 80);
    }
}
