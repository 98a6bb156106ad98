// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ingestion: the idempotent persistence pipeline.
//!
//! `persist_message` is the single write path for every message in the
//! system, inbound or outbound, chat or commerce. Duplicate platform
//! deliveries collapse onto the existing row and skip all side effects
//! (lead timestamps, channel counters, notifications).

use leadline_core::EngineError;
use leadline_core::types::{ChatEvent, Direction, MessageRecord, MessageSource, NewMessage, now_ts};
use leadline_storage::queries::messages::{self, UpsertOutcome};
use leadline_storage::queries::{channels, leads};
use tracing::{debug, warn};

use crate::Engine;

impl Engine {
    /// Persist a message idempotently and run the insert-only
    /// bookkeeping: lead last-contact timestamp, channel counter, and
    /// the per-lead notification push.
    pub async fn persist_message(
        &self,
        new: NewMessage,
    ) -> Result<(MessageRecord, UpsertOutcome), EngineError> {
        let now = now_ts();
        let created_at = new.timestamp.clone().unwrap_or_else(|| now.clone());
        let attachments =
            serde_json::to_string(&new.attachments).map_err(|e| EngineError::Internal(
                format!("attachment list serialization failed: {e}"),
            ))?;

        let candidate = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_user_id: new.tenant_user_id,
            company_id: new.company_id,
            lead_id: new.lead_id,
            source: new.source,
            channel_id: new.channel_id,
            external_id: new.external_id,
            author_id: new.author_id,
            author_name: new.author_name,
            body: new.body,
            direction: new.direction,
            is_read: new.is_read,
            attachments,
            metadata: new.metadata,
            created_at,
            updated_at: now,
        };

        let (stored, outcome) = messages::upsert(&self.db, &candidate).await?;
        match outcome {
            UpsertOutcome::Inserted => {
                leads::touch_last_message(&self.db, &stored.lead_id, stored.source, &stored.created_at)
                    .await?;
                // No-op unless the message landed in a mapped thread.
                channels::record_message(&self.db, &stored.channel_id, &stored.created_at).await?;
                if let Err(e) = self.notifier.publish(&stored.lead_id, &stored).await {
                    warn!(lead_id = %stored.lead_id, error = %e, "message notification failed");
                }
            }
            UpsertOutcome::Updated => {
                debug!(
                    external_id = %stored.external_id,
                    source = %stored.source,
                    "duplicate event ignored"
                );
            }
        }
        Ok((stored, outcome))
    }

    /// The inbound pipeline for a decoded chat event: identity →
    /// channel bookkeeping (guild events only) → persist.
    pub async fn handle_chat_event(&self, event: ChatEvent) -> Result<(), EngineError> {
        let Some(resolved) = self.resolve_identity(&event).await? else {
            return Ok(());
        };

        // DMs persist without a channel; guild traffic keeps the thread
        // provisioned and the prospect invited.
        if !event.is_direct() {
            if let Err(e) = self.ensure_channel(&resolved.lead).await {
                warn!(lead_id = %resolved.lead.id, error = %e, "channel provisioning failed");
            }
        }

        self.persist_message(NewMessage {
            tenant_user_id: resolved.ctx.tenant_user_id,
            company_id: resolved.ctx.company_id,
            lead_id: resolved.lead.id,
            source: MessageSource::Chat,
            channel_id: event.channel_id,
            external_id: event.external_id,
            author_id: Some(event.author_id),
            author_name: Some(event.author_name),
            body: event.body,
            direction: Direction::Incoming,
            is_read: false,
            attachments: event.attachments,
            metadata: None,
            timestamp: Some(event.timestamp),
        })
        .await?;
        Ok(())
    }
}
