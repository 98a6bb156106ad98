// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadline status` command implementation.
//!
//! Queries the gateway health endpoint to display service state and the
//! chat platform session. Falls back gracefully when the service is not
//! running.

use std::time::Duration;

use leadline_config::model::LeadlineConfig;
use leadline_core::EngineError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    session: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub version: Option<String>,
    pub session: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Run the `leadline status` command.
pub async fn run_status(config: &LeadlineConfig, json: bool) -> Result<(), EngineError> {
    let host = &config.gateway.host;
    let port = config.gateway.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| EngineError::Internal(format!("failed to create HTTP client: {e}")))?;

    let response = match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                EngineError::Internal(format!("failed to parse health response: {e}"))
            })?;
            StatusResponse {
                running: true,
                status: health.status,
                version: Some(health.version),
                session: Some(health.session),
                gateway_host: host.clone(),
                gateway_port: port,
            }
        }
        _ => StatusResponse {
            running: false,
            status: "not running".to_string(),
            version: None,
            session: None,
            gateway_host: host.clone(),
            gateway_port: port,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else if response.running {
        println!("leadline is running on {host}:{port}");
        if let Some(version) = &response.version {
            println!("  version: {version}");
        }
        if let Some(session) = &response.session {
            println!("  chat session: {session}");
        }
    } else {
        println!("leadline is not running on {host}:{port}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_json_round_trips() {
        let response = StatusResponse {
            running: true,
            status: "ok".into(),
            version: Some("0.1.0".into()),
            session: Some("connected".into()),
            gateway_host: "127.0.0.1".into(),
            gateway_port: 8787,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"running\":true"));
        assert!(json.contains("connected"));
    }
}
