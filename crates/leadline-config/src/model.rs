// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Leadline service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Leadline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadlineConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chat platform (Discord) integration settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Commerce platform support-feed polling settings.
    #[serde(default)]
    pub commerce: CommerceConfig,

    /// HTTP/WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Routing engine behavior settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "leadline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("leadline").join("leadline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("leadline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Chat platform (Discord) integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Bot token. `None` disables the chat integration.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// REST API base URL. Overridable for testing.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Gateway websocket URL.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Application client id, used to build the authorization invite URL.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Name of the shared intake channel that hosts per-lead threads.
    #[serde(default = "default_intake_channel")]
    pub intake_channel_name: String,

    /// Notice posted into a thread after inviting a lead.
    #[serde(default = "default_welcome_notice")]
    pub welcome_notice: String,

    /// Per-request timeout for platform calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            gateway_url: default_gateway_url(),
            client_id: None,
            intake_channel_name: default_intake_channel(),
            welcome_notice: default_welcome_notice(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_intake_channel() -> String {
    "leads-intake".to_string()
}

fn default_welcome_notice() -> String {
    "Hi! A member of our team will be with you shortly.".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Commerce platform polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommerceConfig {
    /// Enable the commerce support-feed poller.
    #[serde(default)]
    pub enabled: bool,

    /// Commerce platform API base URL.
    #[serde(default = "default_commerce_api_base")]
    pub api_base: String,

    /// API key for the commerce platform.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout for commerce calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_commerce_api_base(),
            api_key: None,
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_commerce_api_base() -> String {
    "https://api.whop.com/api/v2".to_string()
}

fn default_poll_interval_secs() -> u64 {
    45
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for API auth. `None` rejects all requests (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8787
}

/// Routing engine behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Cap on concurrently processed inbound events.
    #[serde(default = "default_max_concurrent_events")]
    pub max_concurrent_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_events: default_max_concurrent_events(),
        }
    }
}

fn default_max_concurrent_events() -> usize {
    8
}
