// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatch: tenant-authored messages to leads.
//!
//! The lead path routes through the lead's private thread, provisioning
//! it on demand. The account path is the legacy DM fallback for callers
//! that only know a platform account id. Either way the outgoing
//! message is persisted pre-read; if persistence fails after the
//! platform accepted the send, that desync is logged loudly and
//! surfaced to the caller instead of being swallowed.

use leadline_core::EngineError;
use leadline_core::types::{
    Direction, Lead, MessageSource, NewMessage, SendMethod, SessionStatus, TenantContext, now_ts,
};
use leadline_storage::queries::{connections, leads};
use tracing::{error, info, warn};

use crate::Engine;
use crate::identity::KIND_DM;

/// An outbound send. Exactly one of `lead_id` / `account_id` is set.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub lead_id: Option<String>,
    pub account_id: Option<String>,
    pub body: String,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
    pub method: SendMethod,
    pub lead_id: String,
}

impl Engine {
    /// Deliver a tenant-authored message.
    pub async fn send(
        &self,
        ctx: &TenantContext,
        request: SendRequest,
    ) -> Result<SendReceipt, EngineError> {
        if self.chat.status() != SessionStatus::Connected {
            return Err(EngineError::PlatformUnavailable);
        }

        match (&request.lead_id, &request.account_id) {
            (Some(lead_id), _) => self.send_to_lead(ctx, lead_id, &request.body).await,
            (None, Some(account_id)) => self.send_to_account(ctx, account_id, &request.body).await,
            (None, None) => Err(EngineError::Internal(
                "send request carries neither lead_id nor account_id".into(),
            )),
        }
    }

    async fn send_to_lead(
        &self,
        ctx: &TenantContext,
        lead_id: &str,
        body: &str,
    ) -> Result<SendReceipt, EngineError> {
        let lead = leads::get_scoped(&self.db, lead_id, &ctx.company_id)
            .await?
            .ok_or_else(|| EngineError::LeadNotFound {
                lead_id: lead_id.to_string(),
            })?;

        let channel = self.ensure_channel(&lead).await?;
        let message_id = self.chat.send_to_channel(&channel.thread_id, body).await?;

        self.record_outgoing(ctx, &lead, &channel.thread_id, &message_id, body)
            .await?;
        info!(lead_id = %lead.id, message_id = %message_id, "dispatched via thread");
        Ok(SendReceipt {
            message_id,
            method: SendMethod::Thread,
            lead_id: lead.id,
        })
    }

    /// Legacy path: caller only knows the recipient's platform account.
    /// The DM goes out first; the lead is then resolved or created for
    /// the recipient so history lands somewhere.
    async fn send_to_account(
        &self,
        ctx: &TenantContext,
        account_id: &str,
        body: &str,
    ) -> Result<SendReceipt, EngineError> {
        // Accounts owning an active connection are teammates, never
        // leads; refuse before anything goes out.
        if let Some(owner) = connections::active_by_account(&self.db, account_id).await? {
            warn!(
                account_id,
                tenant_user_id = %owner.tenant_user_id,
                "refusing DM send to a connection owner"
            );
            return Err(EngineError::DeliveryBlocked {
                reason: format!("account {account_id} belongs to a connection owner"),
            });
        }

        let (dm_channel_id, message_id) = self.chat.send_direct(account_id, body).await?;

        let lead = match leads::find_by_account(&self.db, &ctx.company_id, account_id).await? {
            Some(lead) => lead,
            None => {
                let candidate = Lead {
                    id: uuid::Uuid::new_v4().to_string(),
                    company_id: ctx.company_id.clone(),
                    tenant_user_id: ctx.tenant_user_id.clone(),
                    account_id: Some(account_id.to_string()),
                    account_name: None,
                    thread_id: None,
                    invite_sent: false,
                    joined_thread: false,
                    commerce_member_id: None,
                    commerce_channel_id: None,
                    status: "new".to_string(),
                    channel_kind: KIND_DM.to_string(),
                    last_chat_message_at: None,
                    last_commerce_message_at: None,
                    created_at: now_ts(),
                };
                let (lead, created) = leads::insert_or_fetch(&self.db, &candidate).await?;
                if created {
                    info!(lead_id = %lead.id, account_id, "lead created by outbound DM");
                    if let Err(e) = self.notifier.lead_created(&lead).await {
                        warn!(lead_id = %lead.id, error = %e, "lead-created notification failed");
                    }
                }
                lead
            }
        };

        self.record_outgoing(ctx, &lead, &dm_channel_id, &message_id, body)
            .await?;
        info!(lead_id = %lead.id, message_id = %message_id, "dispatched via direct message");
        Ok(SendReceipt {
            message_id,
            method: SendMethod::Dm,
            lead_id: lead.id,
        })
    }

    /// Persist an outgoing message that the platform already accepted.
    async fn record_outgoing(
        &self,
        ctx: &TenantContext,
        lead: &Lead,
        channel_id: &str,
        message_id: &str,
        body: &str,
    ) -> Result<(), EngineError> {
        let author_id = self.chat.bot_account_id().await.ok();
        let result = self
            .persist_message(NewMessage {
                tenant_user_id: ctx.tenant_user_id.clone(),
                company_id: ctx.company_id.clone(),
                lead_id: lead.id.clone(),
                source: MessageSource::Chat,
                channel_id: channel_id.to_string(),
                external_id: message_id.to_string(),
                author_id,
                author_name: None,
                body: body.to_string(),
                direction: Direction::Outgoing,
                is_read: true,
                attachments: Vec::new(),
                metadata: None,
                timestamp: None,
            })
            .await;
        if let Err(e) = &result {
            // The platform accepted the send; local history is now
            // behind until this message id is backfilled.
            error!(
                lead_id = %lead.id,
                message_id,
                error = %e,
                "message delivered but not recorded"
            );
        }
        result.map(|_| ())
    }
}
