use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::watch;

use filament_sync::config::constants;
use filament_sync::session::Liveness;
use filament_sync::{
    CloudTaskClient, Config, FilamentNaming, InventoryClient, Reconciler, TelemetryListener,
    UsageStrategy, health, listener,
};

/// Filament Sync - keeps a filament inventory in step with what the printer uses.
///
/// The service subscribes to the printer's MQTT report topic, tracks each print
/// session, and when a print finishes or fails posts the grams consumed per
/// spool to the inventory's deduction endpoint.
///
/// # Environment Variables
///
/// Required:
/// * `PRINTER_SERIAL` - Printer serial number
///
/// Optional (with defaults):
/// * `PRINTER_IP` - Printer LAN address (default: "192.168.1.100")
/// * `PRINTER_ACCESS_CODE` - LAN access code (default: "")
/// * `CLOUD_MQTT_ENABLED` - Use the vendor cloud relay (default: "false")
/// * `CLOUD_MQTT_SERVER` - Cloud relay host (default: "us.mqtt.bambulab.com")
/// * `CLOUD_MQTT_UID` - Cloud user id
/// * `CLOUD_MQTT_TOKEN` - Cloud token; also enables cloud task lookups
/// * `CLOUD_API_URL` - Cloud API base (default: "https://api.bambulab.com")
/// * `TRACKER_API_URL` - Inventory base URL (default: "http://localhost:3000")
/// * `TRACKER_API_KEY` - Inventory API key
/// * `HEALTH_PORT` - Liveness port (default: "3001")
/// * `FILAMENT_BRAND` - Inventory brand label (default: "Bambu Lab")
/// * `TRANSLATE_COLOR_NAMES` - Send color names instead of hex codes (default: "false")
///
/// # Usage
///
/// ```bash
/// export PRINTER_SERIAL="01P00A000000001"
/// export PRINTER_ACCESS_CODE="12345678"
/// export TRACKER_API_URL="https://inventory.local"
/// export TRACKER_API_KEY="..."
/// ./filament-sync
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().context(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    )?;

    info!("=== Filament Sync starting ===");
    info!("Printer serial: {}", config.printer_serial);
    info!(
        "MQTT mode: {} ({})",
        config.broker.label(),
        config.broker.host()
    );
    info!("Tracker API: {}", config.tracker_api_url);
    if config.tracker_api_key.is_empty() {
        warn!("API key configured: NO, deductions will fail!");
    } else {
        info!("API key configured: yes");
    }

    let strategy = match &config.cloud_token {
        Some(token) => UsageStrategy::CloudTask(Arc::new(
            CloudTaskClient::new(
                config.cloud_api_url.clone(),
                config.printer_serial.clone(),
                Some(token.clone()),
            )
            .context("Failed to create cloud task client")?,
        )),
        None => UsageStrategy::LocalDelta,
    };
    info!("Usage source: {}", strategy.label());

    let inventory = InventoryClient::new(
        config.tracker_api_url.clone(),
        config.tracker_api_key.clone(),
    )
    .context("Failed to create inventory client")?;

    let reconciler = Arc::new(Reconciler::new(
        strategy,
        Arc::new(inventory),
        FilamentNaming::new(config.filament_brand.clone(), config.translate_color_names),
        Duration::from_secs(constants::CLOUD_GRACE_PERIOD_SECONDS),
    ));

    let (liveness_tx, liveness_rx) = watch::channel(Liveness {
        print_state: "IDLE".to_string(),
        print_running: false,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    let health_listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health check port {}", config.health_port))?;
    info!("Health check server running on port {}", config.health_port);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health::create_router(liveness_rx)).await {
            error!("Health check server stopped: {}", e);
        }
    });

    info!(
        "Connecting to {} MQTT broker at {}:{}",
        config.broker.label(),
        config.broker.host(),
        constants::MQTT_PORT
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let telemetry = TelemetryListener::new(
        config.report_topic(),
        config.broker.host().to_string(),
        reconciler,
        liveness_tx,
    );
    let mut listener_task = tokio::spawn(telemetry.run(listener::mqtt_options(&config), shutdown_rx));

    let signal = tokio::select! {
        signal = shutdown_signal() => signal,
        _ = &mut listener_task => {
            error!("Telemetry listener exited unexpectedly");
            return Ok(());
        }
    };

    info!("Received {}, shutting down...", signal);
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(constants::SHUTDOWN_GRACE_SECONDS);
    if tokio::time::timeout(grace, listener_task).await.is_err() {
        warn!(
            "MQTT disconnect did not finish within {}s, exiting anyway",
            grace.as_secs()
        );
    }

    std::process::exit(0);
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
