// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-loaded commerce support feed for poller tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use leadline_core::EngineError;
use leadline_core::traits::CommerceFeed;
use leadline_core::types::CommerceMessage;

/// In-memory commerce feed keyed by channel id.
#[derive(Default)]
pub struct MockCommerceFeed {
    channels: Mutex<HashMap<String, Vec<CommerceMessage>>>,
    fail: Mutex<bool>,
}

impl MockCommerceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a channel's feed.
    pub fn push(&self, message: CommerceMessage) {
        self.channels
            .lock()
            .unwrap()
            .entry(message.channel_id.clone())
            .or_default()
            .push(message);
    }

    /// Make every fetch fail, simulating a platform outage.
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

#[async_trait]
impl CommerceFeed for MockCommerceFeed {
    async fn fetch_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
    ) -> Result<Vec<CommerceMessage>, EngineError> {
        if *self.fail.lock().unwrap() {
            return Err(EngineError::Platform {
                message: "commerce feed unavailable".into(),
                source: None,
            });
        }
        let channels = self.channels.lock().unwrap();
        let mut messages: Vec<_> = channels
            .get(channel_id)
            .map(|m| m.to_vec())
            .unwrap_or_default();
        if let Some(after) = after {
            messages.retain(|m| m.timestamp.as_str() > after);
        }
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }
}
