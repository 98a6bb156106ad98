// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord gateway session.
//!
//! Maintains the websocket connection that delivers MESSAGE_CREATE
//! events: hello/identify handshake, heartbeats at the server-assigned
//! interval, and reconnection with exponential backoff. The shared
//! [`SessionStatus`] cell is the only state other components read;
//! decoded events flow out through an mpsc channel.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::{SinkExt, StreamExt};
use leadline_core::EngineError;
use leadline_core::types::{ChatEvent, SessionStatus};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::events;

// Gateway opcodes.
const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT.
const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

/// Runs the gateway session until the event channel closes.
///
/// Reconnects forever with exponential backoff; `status` tracks each
/// connection attempt so dispatch can refuse sends while disconnected.
pub async fn run_session(
    gateway_url: String,
    bot_token: String,
    status: Arc<ArcSwap<SessionStatus>>,
    events_tx: mpsc::Sender<ChatEvent>,
) {
    let mut backoff = BACKOFF_INITIAL;
    loop {
        status.store(Arc::new(SessionStatus::Connecting));
        match run_once(&gateway_url, &bot_token, &status, &events_tx).await {
            Ok(SessionEnd::Closed) => {
                debug!("gateway session closed by server, reconnecting");
                backoff = BACKOFF_INITIAL;
            }
            Ok(SessionEnd::ReceiverGone) => {
                info!("event receiver dropped, stopping gateway session");
                status.store(Arc::new(SessionStatus::Disconnected));
                return;
            }
            Err(e) => {
                warn!(error = %e, "gateway session failed");
            }
        }
        status.store(Arc::new(SessionStatus::Disconnected));
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}

enum SessionEnd {
    /// Server closed the socket or asked for a reconnect.
    Closed,
    /// The engine side of the event channel is gone; shut down.
    ReceiverGone,
}

async fn run_once(
    gateway_url: &str,
    bot_token: &str,
    status: &Arc<ArcSwap<SessionStatus>>,
    events_tx: &mpsc::Sender<ChatEvent>,
) -> Result<SessionEnd, EngineError> {
    let (stream, _response) =
        connect_async(gateway_url)
            .await
            .map_err(|e| EngineError::Platform {
                message: format!("gateway connect failed: {e}"),
                source: Some(Box::new(e)),
            })?;
    let (mut sink, mut source) = stream.split();

    // First frame must be HELLO with the heartbeat interval.
    let hello = read_frame(&mut source).await?.ok_or(EngineError::Platform {
        message: "gateway closed before HELLO".into(),
        source: None,
    })?;
    if hello.op != OP_HELLO {
        return Err(EngineError::Platform {
            message: format!("expected HELLO, got op {}", hello.op),
            source: None,
        });
    }
    let hello_data: HelloData =
        serde_json::from_value(hello.d).map_err(|e| EngineError::Platform {
            message: format!("malformed HELLO payload: {e}"),
            source: Some(Box::new(e)),
        })?;

    let identify = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": bot_token,
            "intents": INTENTS,
            "properties": { "os": std::env::consts::OS, "browser": "leadline", "device": "leadline" }
        }
    });
    send_frame(&mut sink, &identify).await?;

    let mut heartbeat =
        tokio::time::interval(Duration::from_millis(hello_data.heartbeat_interval));
    // First tick fires immediately; skip it so the cadence starts one
    // interval after HELLO.
    heartbeat.tick().await;
    let mut last_seq: Option<u64> = None;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                send_frame(&mut sink, &json!({ "op": OP_HEARTBEAT, "d": last_seq })).await?;
            }
            frame = read_frame(&mut source) => {
                let Some(frame) = frame? else {
                    return Ok(SessionEnd::Closed);
                };
                if let Some(seq) = frame.s {
                    last_seq = Some(seq);
                }
                match frame.op {
                    OP_DISPATCH => match frame.t.as_deref() {
                        Some("READY") => {
                            status.store(Arc::new(SessionStatus::Connected));
                            info!("gateway session ready");
                        }
                        Some("MESSAGE_CREATE") => {
                            if let Some(event) = events::decode_message_create(&frame.d) {
                                if events_tx.send(event).await.is_err() {
                                    return Ok(SessionEnd::ReceiverGone);
                                }
                            }
                        }
                        _ => {}
                    },
                    OP_HEARTBEAT => {
                        send_frame(&mut sink, &json!({ "op": OP_HEARTBEAT, "d": last_seq })).await?;
                    }
                    OP_RECONNECT | OP_INVALID_SESSION => {
                        debug!(op = frame.op, "gateway requested reconnect");
                        return Ok(SessionEnd::Closed);
                    }
                    OP_HEARTBEAT_ACK => {}
                    other => {
                        debug!(op = other, "ignoring gateway frame");
                    }
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, value: &serde_json::Value) -> Result<(), EngineError>
where
    S: SinkExt<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    sink.send(WsMessage::Text(value.to_string().into()))
        .await
        .map_err(|e| EngineError::Platform {
            message: format!("gateway send failed: {e}"),
            source: Some(Box::new(e)),
        })
}

async fn read_frame<S>(source: &mut S) -> Result<Option<GatewayFrame>, EngineError>
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let Some(message) = source.next().await else {
            return Ok(None);
        };
        let message = message.map_err(|e| EngineError::Platform {
            message: format!("gateway read failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        match message {
            WsMessage::Text(text) => {
                let frame: GatewayFrame =
                    serde_json::from_str(&text).map_err(|e| EngineError::Platform {
                        message: format!("malformed gateway frame: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return Ok(Some(frame));
            }
            WsMessage::Close(_) => return Ok(None),
            // Ping/pong handled by tungstenite; binary frames are not
            // expected with JSON encoding.
            _ => continue,
        }
    }
}
