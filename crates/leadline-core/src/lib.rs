// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Leadline routing engine.
//!
//! Provides the error taxonomy, the canonical message/lead/connection
//! types, and the port traits implemented by the platform integrations
//! and the notification hub.

pub mod error;
pub mod traits;
pub mod types;

pub use error::EngineError;
pub use types::{
    ChatEvent, Connection, Direction, Lead, LeadChannel, MessageRecord, MessageSource,
    SendMethod, SessionStatus, TenantContext,
};

pub use traits::{ChatPort, CommerceFeed, Notifier};
