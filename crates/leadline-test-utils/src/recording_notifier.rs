// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that records everything it is asked to publish.

use std::sync::Mutex;

use async_trait::async_trait;
use leadline_core::EngineError;
use leadline_core::traits::Notifier;
use leadline_core::types::{Lead, MessageRecord};

/// Captures published notifications for assertion.
#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<(String, MessageRecord)>>,
    leads: Mutex<Vec<Lead>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(lead_id, record)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, MessageRecord)> {
        self.published.lock().unwrap().clone()
    }

    pub fn created_leads(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, lead_id: &str, message: &MessageRecord) -> Result<(), EngineError> {
        self.published
            .lock()
            .unwrap()
            .push((lead_id.to_string(), message.clone()));
        Ok(())
    }

    async fn lead_created(&self, lead: &Lead) -> Result<(), EngineError> {
        self.leads.lock().unwrap().push(lead.clone());
        Ok(())
    }
}
