// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Leadline routing engine.
//!
//! Ties the storage layer and the platform ports together: connection
//! registry, identity resolution for inbound events, channel lifecycle,
//! idempotent message ingestion, outbound dispatch, and the commerce
//! reconciliation poller. All platform access goes through the port
//! traits so the engine itself never sees a raw platform payload.

pub mod channel;
pub mod dispatch;
pub mod identity;
pub mod ingest;
pub mod poller;
pub mod registry;

use std::sync::Arc;

use leadline_core::traits::{ChatPort, Notifier};
use leadline_storage::Database;

pub use dispatch::{SendReceipt, SendRequest};
pub use identity::ResolvedIdentity;
pub use poller::run_commerce_poller;
pub use registry::NewConnection;

/// Engine behavior knobs, derived from config in the binary.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Name of the shared intake channel that hosts per-lead threads.
    pub intake_channel_name: String,
    /// Notice posted into a thread after inviting a lead.
    pub welcome_notice: String,
}

/// The routing engine. Cheap to clone behind an [`Arc`]; all state
/// lives in storage and in the shared port implementations.
pub struct Engine {
    db: Database,
    chat: Arc<dyn ChatPort>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        db: Database,
        chat: Arc<dyn ChatPort>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            db,
            chat,
            notifier,
            settings,
        }
    }

    /// The backing database handle, for read paths served directly by
    /// the gateway.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The chat platform port.
    pub fn chat(&self) -> &Arc<dyn ChatPort> {
        &self.chat
    }
}
