// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Leadline routing engine.
//!
//! The REST surface covers outbound dispatch, connection management,
//! channel lifecycle, and message history; `/ws` streams live per-lead
//! updates published by the engine through [`notify::NotifyHub`].

pub mod auth;
pub mod handlers;
pub mod notify;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use notify::NotifyHub;
pub use server::{GatewayState, ServerConfig, build_router, start_server};
