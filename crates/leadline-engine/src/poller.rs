// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commerce reconciliation poller.
//!
//! The commerce platform has no event push, so support-channel messages
//! are pulled on an interval and fed through the same idempotent
//! persistence path as chat events. Redelivery across overlapping polls
//! is harmless; per-lead failures are logged and the sweep continues.

use std::sync::Arc;
use std::time::Duration;

use leadline_core::traits::CommerceFeed;
use leadline_core::types::{Direction, MessageSource, NewMessage};
use leadline_storage::queries::leads;
use leadline_storage::queries::messages::UpsertOutcome;
use tracing::{debug, info, warn};

use crate::Engine;

impl Engine {
    /// One reconciliation sweep over every lead with a bound commerce
    /// support channel. Returns how many new messages were persisted.
    pub async fn poll_commerce_once(
        &self,
        feed: &dyn CommerceFeed,
    ) -> Result<usize, leadline_core::EngineError> {
        let bound = leads::with_commerce_channel(&self.db).await?;
        let mut inserted = 0usize;

        for lead in bound {
            let Some(channel_id) = lead.commerce_channel_id.as_deref() else {
                continue;
            };
            let fetched = match feed
                .fetch_messages(channel_id, lead.last_commerce_message_at.as_deref())
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(lead_id = %lead.id, channel_id, error = %e, "commerce fetch failed");
                    continue;
                }
            };

            for message in fetched {
                let result = self
                    .persist_message(NewMessage {
                        tenant_user_id: lead.tenant_user_id.clone(),
                        company_id: lead.company_id.clone(),
                        lead_id: lead.id.clone(),
                        source: MessageSource::Commerce,
                        channel_id: message.channel_id,
                        external_id: message.external_id,
                        author_id: message.author_id,
                        author_name: message.author_name,
                        body: message.body,
                        direction: Direction::Incoming,
                        is_read: false,
                        attachments: Vec::new(),
                        metadata: None,
                        timestamp: Some(message.timestamp),
                    })
                    .await;
                match result {
                    Ok((_, UpsertOutcome::Inserted)) => inserted += 1,
                    Ok((_, UpsertOutcome::Updated)) => {}
                    Err(e) => {
                        warn!(lead_id = %lead.id, error = %e, "commerce message persist failed");
                    }
                }
            }
        }

        if inserted > 0 {
            debug!(inserted, "commerce sweep persisted new messages");
        }
        Ok(inserted)
    }
}

/// Runs the poller loop until the process shuts down.
pub async fn run_commerce_poller(
    engine: Arc<Engine>,
    feed: Arc<dyn CommerceFeed>,
    interval: Duration,
) {
    info!(interval_secs = interval.as_secs(), "commerce poller started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = engine.poll_commerce_once(feed.as_ref()).await {
            warn!(error = %e, "commerce sweep failed");
        }
    }
}
