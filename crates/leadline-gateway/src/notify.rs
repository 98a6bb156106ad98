// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-lead notification topics backing the WebSocket endpoint.
//!
//! The engine publishes every freshly persisted message and every new
//! lead through [`Notifier`]; subscribers get the full canonical record
//! as JSON. Topics are broadcast channels, so slow consumers lag and
//! drop rather than backpressure the engine.

use async_trait::async_trait;
use dashmap::DashMap;
use leadline_core::EngineError;
use leadline_core::traits::Notifier;
use leadline_core::types::{Lead, MessageRecord};
use serde_json::json;
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 64;

/// In-process fan-out of engine events to per-lead topics.
#[derive(Default)]
pub struct NotifyHub {
    topics: DashMap<String, broadcast::Sender<String>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a lead's topic, creating it if needed.
    pub fn subscribe(&self, lead_id: &str) -> broadcast::Receiver<String> {
        self.topic(lead_id).subscribe()
    }

    fn topic(&self, lead_id: &str) -> broadcast::Sender<String> {
        self.topics
            .entry(lead_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    fn push(&self, lead_id: &str, payload: String) {
        // A send error just means nobody is listening right now.
        let _ = self.topic(lead_id).send(payload);
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    async fn publish(&self, lead_id: &str, message: &MessageRecord) -> Result<(), EngineError> {
        let payload = json!({ "type": "message", "message": message }).to_string();
        self.push(lead_id, payload);
        Ok(())
    }

    async fn lead_created(&self, lead: &Lead) -> Result<(), EngineError> {
        let payload = json!({ "type": "lead_created", "lead": lead }).to_string();
        self.push(&lead.id, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadline_core::types::{Direction, MessageSource, now_ts};

    fn record(lead_id: &str) -> MessageRecord {
        let ts = now_ts();
        MessageRecord {
            id: "m1".into(),
            tenant_user_id: "u1".into(),
            company_id: "co-1".into(),
            lead_id: lead_id.into(),
            source: MessageSource::Chat,
            channel_id: "c1".into(),
            external_id: "x1".into(),
            author_id: None,
            author_name: None,
            body: "hello".into(),
            direction: Direction::Incoming,
            is_read: false,
            attachments: "[]".into(),
            metadata: None,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("lead-1");

        hub.publish("lead-1", &record("lead-1")).await.unwrap();

        let payload = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["type"], "message");
        assert_eq!(parsed["message"]["body"], "hello");
    }

    #[tokio::test]
    async fn topics_are_isolated_per_lead() {
        let hub = NotifyHub::new();
        let mut other = hub.subscribe("lead-2");

        hub.publish("lead-1", &record("lead-1")).await.unwrap();

        assert!(matches!(
            other.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let hub = NotifyHub::new();
        hub.publish("lead-9", &record("lead-9")).await.unwrap();
    }
}
