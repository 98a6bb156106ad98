// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical types shared across the Leadline engine, storage layer,
//! platform ports, and gateway.
//!
//! Raw platform payloads never leave their integration crate: the
//! boundary decoders normalize everything into [`ChatEvent`] /
//! [`CommerceMessage`], and the engine only ever emits [`MessageRecord`].

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// RFC 3339 UTC timestamp with millisecond precision, the storage format
/// for every timestamp column.
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Tenant identity resolved upstream (session/auth) and passed into
/// every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_user_id: String,
    pub company_id: String,
}

/// Which platform a message originated from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Chat,
    Commerce,
}

/// Message direction relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Point-in-time state of the chat platform session.
///
/// Replaces a bare "is the bot running" boolean so concurrent readers
/// get a consistent answer during start/stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// How an outbound message was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMethod {
    Thread,
    Dm,
}

/// A normalized inbound event from the chat platform gateway.
///
/// Produced only by the platform boundary decoder; bot-authored events
/// are dropped before this type is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Platform message id, unique per source.
    pub external_id: String,
    /// Channel (or thread, or DM channel) the message arrived in.
    pub channel_id: String,
    /// Present for guild messages, `None` for direct messages.
    pub guild_id: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    /// Attachment URLs.
    pub attachments: Vec<String>,
    /// RFC 3339 timestamp from the platform.
    pub timestamp: String,
}

impl ChatEvent {
    /// Whether this event arrived as a direct message.
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// A normalized message from the commerce platform's support channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceMessage {
    pub external_id: String,
    pub channel_id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub body: String,
    pub timestamp: String,
}

/// Input to the idempotent message persistence operation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub tenant_user_id: String,
    pub company_id: String,
    pub lead_id: String,
    pub source: MessageSource,
    pub channel_id: String,
    pub external_id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub body: String,
    pub direction: Direction,
    pub is_read: bool,
    pub attachments: Vec<String>,
    pub metadata: Option<String>,
    /// Platform timestamp; falls back to ingestion time when absent.
    pub timestamp: Option<String>,
}

/// Canonical persisted message, as stored and as pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub tenant_user_id: String,
    pub company_id: String,
    pub lead_id: String,
    pub source: MessageSource,
    pub channel_id: String,
    pub external_id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub body: String,
    pub direction: Direction,
    pub is_read: bool,
    /// JSON array of attachment URLs.
    pub attachments: String,
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One tenant user's link to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub tenant_user_id: String,
    pub company_id: String,
    pub account_id: String,
    pub account_name: String,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub session_token: Option<String>,
    pub is_active: bool,
    pub connected_at: String,
    pub last_synced_at: Option<String>,
    pub synced_members: i64,
    pub synced_channels: i64,
}

/// A CRM lead, restricted to the fields the routing engine touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub company_id: String,
    pub tenant_user_id: String,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub thread_id: Option<String>,
    pub invite_sent: bool,
    pub joined_thread: bool,
    pub commerce_member_id: Option<String>,
    pub commerce_channel_id: Option<String>,
    pub status: String,
    pub channel_kind: String,
    pub last_chat_message_at: Option<String>,
    pub last_commerce_message_at: Option<String>,
    pub created_at: String,
}

/// The lead-to-thread mapping. Archived rows are kept, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadChannel {
    pub id: String,
    pub tenant_user_id: String,
    pub company_id: String,
    pub lead_id: String,
    pub guild_id: String,
    pub thread_id: String,
    pub thread_name: String,
    pub account_id: Option<String>,
    pub is_active: bool,
    pub message_count: i64,
    pub created_at: String,
    pub last_message_at: Option<String>,
    pub archived_reason: Option<String>,
}

/// A tenant user mirrored from the upstream identity layer, used for
/// orphan checks and the DM auto-repair fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUser {
    pub id: String,
    pub company_id: String,
    pub display_name: Option<String>,
    pub last_active_at: String,
}

/// A guild the integration belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
}

/// Member/channel counts observed during a connection sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuildCounts {
    pub members: i64,
    pub channels: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn message_source_round_trips_lowercase() {
        assert_eq!(MessageSource::Chat.to_string(), "chat");
        assert_eq!(MessageSource::Commerce.to_string(), "commerce");
        assert_eq!(
            MessageSource::from_str("commerce").unwrap(),
            MessageSource::Commerce
        );
    }

    #[test]
    fn direction_serializes_lowercase() {
        let json = serde_json::to_string(&Direction::Outgoing).unwrap();
        assert_eq!(json, "\"outgoing\"");
        let parsed: Direction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Direction::Outgoing);
    }

    #[test]
    fn chat_event_dm_detection() {
        let mut event = ChatEvent {
            external_id: "m1".into(),
            channel_id: "c1".into(),
            guild_id: None,
            author_id: "u1".into(),
            author_name: "Prospect".into(),
            body: "hi".into(),
            attachments: vec![],
            timestamp: now_ts(),
        };
        assert!(event.is_direct());
        event.guild_id = Some("g1".into());
        assert!(!event.is_direct());
    }

    #[test]
    fn now_ts_is_rfc3339_utc_millis() {
        let ts = now_ts();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
