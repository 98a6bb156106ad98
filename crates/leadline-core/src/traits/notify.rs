// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait for real-time notification of persisted messages.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{Lead, MessageRecord};

/// Publishes engine events to per-lead topics.
///
/// All notification is best-effort: callers log failures and continue,
/// since losing a push must never block persistence or delivery.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Pushes the full canonical record of a freshly persisted message.
    async fn publish(&self, lead_id: &str, message: &MessageRecord) -> Result<(), EngineError>;

    /// Announces a lead created on first contact.
    async fn lead_created(&self, lead: &Lead) -> Result<(), EngineError>;
}
