// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait for the commerce platform's support-channel message feed.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::CommerceMessage;

/// Polling access to a commerce support channel.
///
/// The feed has no event push; the reconciliation poller drives it and
/// relies on the idempotent upsert to absorb redelivered messages.
#[async_trait]
pub trait CommerceFeed: Send + Sync + 'static {
    /// Fetches messages in a support channel, newest last, optionally
    /// restricted to those after the given RFC 3339 timestamp.
    async fn fetch_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<CommerceMessage>, EngineError>;
}
