// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Leadline routing engine.

use thiserror::Error;

/// The primary error type used across the Leadline engine and its ports.
///
/// Variants mirror the routing engine's failure taxonomy: caller-facing
/// delivery failures carry enough context to be surfaced verbatim, while
/// internal recovery cases (`ChannelCreateConflict`) exist so components
/// can recognize and absorb them without leaking past their own scope.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The integration no longer has access to the tenant's chat server.
    /// Recoverable by re-authorization via the carried invite URL.
    #[error("chat server inaccessible{}", guild.as_deref().map(|g| format!(": {g}")).unwrap_or_default())]
    ConnectionInaccessible {
        guild: Option<String>,
        invite_url: String,
    },

    /// An inbound event could not be mapped to any tenant. The event is
    /// dropped and logged; this variant never reaches an API caller.
    #[error("inbound event could not be mapped to a tenant")]
    IdentityUnresolved,

    /// A race during thread creation for the same lead. Recovered
    /// internally by adopting the winning row; never surfaced.
    #[error("concurrent channel creation for lead {lead_id}")]
    ChannelCreateConflict { lead_id: String },

    /// The recipient is unreachable via direct message (DMs disabled,
    /// or the sender is blocked).
    #[error("delivery blocked: {reason}")]
    DeliveryBlocked { reason: String },

    /// The external account id does not resolve to a platform user.
    #[error("chat platform account not found: {account_id}")]
    AccountNotFound { account_id: String },

    /// The lead id does not resolve within the caller's company.
    #[error("lead not found: {lead_id}")]
    LeadNotFound { lead_id: String },

    /// The chat platform session is not connected/authenticated.
    /// Retryable once the session reconnects.
    #[error("chat platform session is not connected")]
    PlatformUnavailable,

    /// External platform request failures (HTTP errors, malformed
    /// responses) that don't map to a more specific variant.
    #[error("platform request failed: {message}")]
    Platform {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (missing token, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// An external call exceeded its deadline. Treated as a delivery
    /// failure; never retried within the same request.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable kind string, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ConnectionInaccessible { .. } => "connection_inaccessible",
            EngineError::IdentityUnresolved => "identity_unresolved",
            EngineError::ChannelCreateConflict { .. } => "channel_create_conflict",
            EngineError::DeliveryBlocked { .. } => "delivery_blocked",
            EngineError::AccountNotFound { .. } => "account_not_found",
            EngineError::LeadNotFound { .. } => "lead_not_found",
            EngineError::PlatformUnavailable => "platform_unavailable",
            EngineError::Platform { .. } => "platform_error",
            EngineError::Storage { .. } => "storage_error",
            EngineError::Config(_) => "config_error",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inaccessible_error_names_guild() {
        let err = EngineError::ConnectionInaccessible {
            guild: Some("Acme HQ".into()),
            invite_url: "https://example.test/invite".into(),
        };
        assert!(err.to_string().contains("Acme HQ"));
        assert_eq!(err.kind(), "connection_inaccessible");
    }

    #[test]
    fn inaccessible_error_without_guild() {
        let err = EngineError::ConnectionInaccessible {
            guild: None,
            invite_url: "https://example.test/invite".into(),
        };
        assert_eq!(err.to_string(), "chat server inaccessible");
    }

    #[test]
    fn kinds_are_distinct_for_caller_facing_variants() {
        let blocked = EngineError::DeliveryBlocked {
            reason: "dms disabled".into(),
        };
        let missing = EngineError::AccountNotFound {
            account_id: "123".into(),
        };
        assert_ne!(blocked.kind(), missing.kind());
        assert_ne!(missing.kind(), EngineError::PlatformUnavailable.kind());
    }
}
