// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway event decoding.
//!
//! MESSAGE_CREATE payloads are normalized into [`ChatEvent`] right at the
//! platform boundary; events authored by bots (including this
//! integration's own outbound sends echoing back) are dropped here and
//! never reach the engine.

use leadline_core::types::ChatEvent;
use serde::Deserialize;
use tracing::trace;

#[derive(Debug, Deserialize)]
struct AuthorPayload {
    id: String,
    username: String,
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct AttachmentPayload {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreatePayload {
    id: String,
    channel_id: String,
    guild_id: Option<String>,
    author: AuthorPayload,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<AttachmentPayload>,
    timestamp: String,
}

/// Decodes a MESSAGE_CREATE dispatch payload.
///
/// Returns `None` for bot-authored messages and for payloads that do not
/// fit the expected shape (which are logged at trace and skipped rather
/// than failing the session).
pub fn decode_message_create(data: &serde_json::Value) -> Option<ChatEvent> {
    let payload: MessageCreatePayload = match serde_json::from_value(data.clone()) {
        Ok(p) => p,
        Err(e) => {
            trace!(error = %e, "skipping undecodable MESSAGE_CREATE payload");
            return None;
        }
    };

    if payload.author.bot {
        return None;
    }

    let author_name = payload
        .author
        .global_name
        .unwrap_or(payload.author.username);

    Some(ChatEvent {
        external_id: payload.id,
        channel_id: payload.channel_id,
        guild_id: payload.guild_id,
        author_id: payload.author.id,
        author_name,
        body: payload.content,
        attachments: payload.attachments.into_iter().map(|a| a.url).collect(),
        timestamp: payload.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_guild_message() {
        let data = json!({
            "id": "m1",
            "channel_id": "c1",
            "guild_id": "g1",
            "author": { "id": "u1", "username": "prospect", "global_name": "Prospect P" },
            "content": "hello there",
            "attachments": [{ "url": "https://cdn.test/a.png", "filename": "a.png" }],
            "timestamp": "2026-01-01T00:00:00.000Z"
        });
        let event = decode_message_create(&data).unwrap();
        assert_eq!(event.external_id, "m1");
        assert_eq!(event.guild_id.as_deref(), Some("g1"));
        assert_eq!(event.author_name, "Prospect P");
        assert_eq!(event.attachments, vec!["https://cdn.test/a.png"]);
        assert!(!event.is_direct());
    }

    #[test]
    fn dm_has_no_guild() {
        let data = json!({
            "id": "m2",
            "channel_id": "dm-1",
            "author": { "id": "u1", "username": "prospect" },
            "content": "psst",
            "timestamp": "2026-01-01T00:00:00.000Z"
        });
        let event = decode_message_create(&data).unwrap();
        assert!(event.is_direct());
        assert_eq!(event.author_name, "prospect");
        assert!(event.attachments.is_empty());
    }

    #[test]
    fn bot_messages_are_dropped() {
        let data = json!({
            "id": "m3",
            "channel_id": "c1",
            "guild_id": "g1",
            "author": { "id": "bot-1", "username": "leadline", "bot": true },
            "content": "echo of our own send",
            "timestamp": "2026-01-01T00:00:00.000Z"
        });
        assert!(decode_message_create(&data).is_none());
    }

    #[test]
    fn malformed_payload_is_skipped() {
        assert!(decode_message_create(&json!({ "id": "m4" })).is_none());
    }
}
