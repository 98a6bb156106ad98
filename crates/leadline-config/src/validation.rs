// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. Collects all errors instead of failing fast.

use crate::model::LeadlineConfig;

/// A single semantic configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors.
pub fn validate_config(config: &LeadlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::new("storage.database_path must not be empty"));
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::new("gateway.host must not be empty"));
    } else {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::new(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.discord.intake_channel_name.trim().is_empty() {
        errors.push(ConfigError::new(
            "discord.intake_channel_name must not be empty",
        ));
    }

    if config.discord.request_timeout_secs == 0 {
        errors.push(ConfigError::new(
            "discord.request_timeout_secs must be at least 1",
        ));
    }

    if config.commerce.poll_interval_secs < 5 {
        errors.push(ConfigError::new(format!(
            "commerce.poll_interval_secs must be at least 5, got {}",
            config.commerce.poll_interval_secs
        )));
    }

    if config.commerce.enabled && config.commerce.api_key.is_none() {
        errors.push(ConfigError::new(
            "commerce.api_key is required when commerce.enabled is true",
        ));
    }

    if config.engine.max_concurrent_events == 0 {
        errors.push(ConfigError::new(
            "engine.max_concurrent_events must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn default_config_is_valid() {
        let config = LeadlineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn commerce_enabled_requires_api_key() {
        let config = load_config_from_str(
            r#"
            [commerce]
            enabled = true
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("api_key")));
    }

    #[test]
    fn collects_multiple_errors() {
        let config = load_config_from_str(
            r#"
            [storage]
            database_path = ""

            [commerce]
            poll_interval_secs = 1

            [engine]
            max_concurrent_events = 0
            "#,
        )
        .unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
