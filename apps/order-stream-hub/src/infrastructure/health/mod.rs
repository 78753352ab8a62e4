//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, hub status reporting, and Prometheus
//! metrics. Used by container orchestrators, load balancers, and
//! monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (gateway bound)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::SessionRegistry;
use crate::domain::membership::MembershipIndex;
use crate::infrastructure::feed::FeedStatus;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Hub version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Gateway accept-loop status.
    pub gateway: GatewayInfo,
    /// Simulated feed status.
    pub feed: FeedInfo,
    /// Session counts.
    pub sessions: SessionsInfo,
    /// Topic membership statistics.
    pub topics: TopicsInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Some systems degraded but functional.
    Degraded,
    /// Critical systems unavailable.
    Unhealthy,
}

/// Gateway accept-loop status.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayInfo {
    /// Whether the WebSocket port is bound and accepting.
    pub listening: bool,
}

/// Feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Whether the feed loop is ticking.
    pub running: bool,
    /// Events published since startup.
    pub events_published: u64,
    /// When the most recent event was published.
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Session counts.
#[derive(Debug, Clone, Serialize)]
pub struct SessionsInfo {
    /// Connected sessions.
    pub connected: usize,
    /// Sessions bound to a user.
    pub authenticated: usize,
}

/// Topic membership statistics.
#[derive(Debug, Clone, Serialize)]
pub struct TopicsInfo {
    /// Topics with at least one member.
    pub topic_count: usize,
    /// Total memberships across all topics.
    pub membership_count: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    registry: Arc<SessionRegistry>,
    index: Arc<MembershipIndex>,
    feed: Arc<FeedStatus>,
    gateway_listening: Arc<AtomicBool>,
    feed_enabled: bool,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        registry: Arc<SessionRegistry>,
        index: Arc<MembershipIndex>,
        feed: Arc<FeedStatus>,
        gateway_listening: Arc<AtomicBool>,
        feed_enabled: bool,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            registry,
            index,
            feed,
            gateway_listening,
            feed_enabled,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.gateway_listening.load(Ordering::SeqCst) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let listening = state.gateway_listening.load(Ordering::SeqCst);
    let feed_running = state.feed.is_running();
    let sessions = state.registry.stats();
    let memberships = state.index.stats();

    HealthResponse {
        status: determine_health_status(listening, state.feed_enabled, feed_running),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        gateway: GatewayInfo { listening },
        feed: FeedInfo {
            running: feed_running,
            events_published: state.feed.events_published(),
            last_event_at: state.feed.last_event_at(),
        },
        sessions: SessionsInfo {
            connected: sessions.connected,
            authenticated: sessions.authenticated,
        },
        topics: TopicsInfo {
            topic_count: memberships.topic_count,
            membership_count: memberships.membership_count,
        },
    }
}

const fn determine_health_status(
    listening: bool,
    feed_enabled: bool,
    feed_running: bool,
) -> HealthStatus {
    if !listening {
        return HealthStatus::Unhealthy;
    }
    if feed_enabled && !feed_running {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
