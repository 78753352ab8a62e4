//! Order Stream Hub Binary
//!
//! Starts the order update hub.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-stream-hub
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDER_HUB_DIRECTORY_FILE`: Path of the JSON user/stock directory
//!
//! ## Optional
//! - `ORDER_HUB_WS_PORT`: WebSocket gateway port (default: 8090)
//! - `ORDER_HUB_HEALTH_PORT`: Health check HTTP port (default: 8091)
//! - `ORDER_HUB_FEED_ENABLED`: Run the simulated feed (default: true)
//! - `ORDER_HUB_FEED_INTERVAL_MS`: Milliseconds between simulated events (default: 5000)
//! - `ORDER_HUB_SESSION_QUEUE_CAPACITY`: Outbound queue size per session (default: 256)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: stockline-order-stream-hub)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use order_stream_hub::infrastructure::telemetry;
use order_stream_hub::{
    AuthService, BroadcastEngine, Directory, FeedStatus, GatewayServer, HealthServer,
    HealthServerState, HubConfig, JsonDirectory, MembershipIndex, SessionRegistry, SimulatedFeed,
    SubscriptionService, UpdateSource, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting Order Stream Hub");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = HubConfig::from_env()?;
    log_config(&config);

    let directory: Arc<dyn Directory> = Arc::new(
        JsonDirectory::load(&config.directory_file).with_context(|| {
            format!(
                "failed to load directory file {}",
                config.directory_file.display()
            )
        })?,
    );

    let shutdown_token = CancellationToken::new();

    // Shared session state
    let registry = Arc::new(SessionRegistry::new());
    let index = Arc::new(MembershipIndex::new());

    // Session services
    let auth = Arc::new(AuthService::new(
        Arc::clone(&directory),
        Arc::clone(&registry),
        Arc::clone(&index),
    ));
    let subscriptions = Arc::new(SubscriptionService::new(
        Arc::clone(&directory),
        Arc::clone(&registry),
        Arc::clone(&index),
    ));

    // Gateway
    let gateway = GatewayServer::new(
        config.server.ws_port,
        config.delivery.session_queue_capacity,
        auth,
        subscriptions,
        Arc::clone(&registry),
        Arc::clone(&index),
        shutdown_token.clone(),
    );
    let gateway_listening = gateway.listening_flag();

    // Health server
    let feed_status = Arc::new(FeedStatus::new());
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&registry),
        Arc::clone(&index),
        Arc::clone(&feed_status),
        gateway_listening,
        config.feed.enabled,
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Simulated feed
    if config.feed.enabled {
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&directory),
            Arc::clone(&registry),
            Arc::clone(&index),
        ));
        let feed = Arc::new(SimulatedFeed::new(
            Arc::clone(&directory),
            engine,
            Arc::clone(&feed_status),
            config.feed.interval,
            shutdown_token.clone(),
        ));
        tokio::spawn(async move {
            if let Err(e) = feed.run().await {
                tracing::error!(error = %e, "Simulated feed error");
            }
        });
    } else {
        tracing::info!("Simulated feed disabled");
    }

    // Gateway accept loop
    let gateway_task = tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            tracing::error!(error = %e, "Gateway error");
        }
    });

    tracing::info!("Order stream hub ready");

    await_shutdown(shutdown_token).await;

    // Give sessions a bounded window to tear down
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, gateway_task).await;

    tracing::info!("Order stream hub stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &HubConfig) {
    tracing::info!(
        directory_file = %config.directory_file.display(),
        ws_port = config.server.ws_port,
        health_port = config.server.health_port,
        feed_enabled = config.feed.enabled,
        feed_interval_ms = config.feed.interval.as_millis(),
        session_queue_capacity = config.delivery.session_queue_capacity,
        "Configuration loaded"
    );
}

/// Load .env file from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
