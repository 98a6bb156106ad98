// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `leadline serve` command implementation.
//!
//! Wires the full service together: SQLite storage, the Discord platform
//! port, the routing engine, the optional commerce poller, and the
//! HTTP/WebSocket gateway. Inbound chat events flow through a bounded
//! concurrent pump so a burst cannot monopolize the writer connection.

use std::sync::Arc;
use std::time::Duration;

use leadline_commerce::CommerceClient;
use leadline_config::model::LeadlineConfig;
use leadline_core::EngineError;
use leadline_core::traits::{ChatPort, Notifier};
use leadline_core::types::ChatEvent;
use leadline_discord::DiscordChannel;
use leadline_engine::{Engine, EngineSettings, run_commerce_poller};
use leadline_gateway::{AuthConfig, GatewayState, NotifyHub, ServerConfig, start_server};
use leadline_storage::Database;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

/// Runs the `leadline serve` command.
pub async fn run_serve(config: LeadlineConfig) -> Result<(), EngineError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting leadline serve");

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "storage ready");

    let hub = Arc::new(NotifyHub::new());

    let discord = Arc::new(DiscordChannel::new(config.discord.clone())?);
    let chat: Arc<dyn ChatPort> = discord.clone();
    let notifier: Arc<dyn Notifier> = hub.clone();

    let engine = Arc::new(Engine::new(
        db.clone(),
        chat,
        notifier,
        EngineSettings {
            intake_channel_name: config.discord.intake_channel_name.clone(),
            welcome_notice: config.discord.welcome_notice.clone(),
        },
    ));

    // Platform session feeding the event pump.
    let (events_tx, events_rx) = mpsc::channel::<ChatEvent>(256);
    let session_task = discord.start(events_tx);

    let pump_task = spawn_event_pump(
        engine.clone(),
        events_rx,
        config.engine.max_concurrent_events,
    );

    let poller_task = if config.commerce.enabled {
        let feed = Arc::new(CommerceClient::new(&config.commerce)?);
        let interval = Duration::from_secs(config.commerce.poll_interval_secs);
        Some(tokio::spawn(run_commerce_poller(
            engine.clone(),
            feed,
            interval,
        )))
    } else {
        info!("commerce poller disabled");
        None
    };

    if config.gateway.bearer_token.is_none() {
        warn!("gateway.bearer_token is not set; all API requests will be rejected");
    }

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
        bearer_token: config.gateway.bearer_token.clone(),
    };
    let state = GatewayState {
        engine: engine.clone(),
        hub,
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
    };
    let server_task = tokio::spawn(async move {
        if let Err(e) = start_server(&server_config, state).await {
            error!(error = %e, "gateway server exited");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EngineError::Internal(format!("failed to install signal handler: {e}")))?;
    info!("shutdown signal received");

    server_task.abort();
    if let Some(task) = poller_task {
        task.abort();
    }
    session_task.abort();
    pump_task.abort();

    db.close().await?;
    info!("leadline serve shutdown complete");
    Ok(())
}

/// Drains platform events into the engine, at most `max_concurrent`
/// in flight at once.
fn spawn_event_pump(
    engine: Arc<Engine>,
    mut events_rx: mpsc::Receiver<ChatEvent>,
    max_concurrent: usize,
) -> tokio::task::JoinHandle<()> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let engine = engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.handle_chat_event(event).await {
                    warn!(error = %e, "inbound event rejected");
                }
                drop(permit);
            });
        }
        info!("event pump stopped");
    })
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("leadline={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
