// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use plant_telemetry::application::connection_manager::ConnectionManager;
use plant_telemetry::application::staleness_watchdog::spawn_watchdog;
use plant_telemetry::application::status_poller::StatusPoller;
use plant_telemetry::domain::plant_status::PlantStatusReport;
use plant_telemetry::infrastructure::config::{load_data_points, load_plant_config};
use plant_telemetry::infrastructure::http_status_source::HttpStatusSource;
use plant_telemetry::infrastructure::ws_transport::WebSocketTransport;
use plant_telemetry::presentation::app_state::AppState;
use plant_telemetry::presentation::handlers::{
    get_layout, get_live, get_status, health_check, send_command, stream_live,
};
use plant_telemetry::presentation::recovery::{
    HealthState, RecoveryPolicy, report_connection_events,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let plant_config = load_plant_config()?;
    let data_points = load_data_points()?;
    tracing::info!("Loaded {} data points", data_points.len());

    // Connection core
    let transport = Arc::new(WebSocketTransport::new());
    let manager = ConnectionManager::new(plant_config.connection.to_settings(), transport);
    tokio::spawn(report_connection_events(manager.subscribe()));

    // Staleness watchdog with the service recovery policy
    let health = Arc::new(HealthState::default());
    let recovery = Arc::new(RecoveryPolicy::new(manager.clone(), health.clone()));
    let watchdog = spawn_watchdog(
        manager.clone(),
        recovery,
        plant_config.watchdog.to_settings(),
    );

    // Plant status polling
    let (plant_status, poller) = match &plant_config.status {
        Some(status) => {
            let source = Arc::new(HttpStatusSource::new(status.url.clone()));
            let (rx, handle) = StatusPoller::new(source, status.poll_interval()).spawn();
            (rx, Some(handle))
        }
        None => {
            tracing::info!("No plant status endpoint configured");
            let (_tx, rx) = watch::channel(PlantStatusReport::unknown());
            (rx, None)
        }
    };

    let state = Arc::new(AppState {
        manager: manager.clone(),
        data_points: Arc::new(data_points),
        plant_status,
        health,
    });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(get_status))
        .route("/live", get(get_live))
        .route("/live/stream", get(stream_live))
        .route("/layout", get(get_layout))
        .route("/points/:id", post(send_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    manager.connect();

    // Start server
    let addr: SocketAddr = plant_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address {}", plant_config.server.bind))?;
    tracing::info!("Starting plant-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watchdog.abort();
    if let Some(poller) = poller {
        poller.abort();
    }
    manager.disconnect();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
