//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Sessions**: Connected and authenticated WebSocket session counts
//! - **Logins**: Login attempts by outcome
//! - **Subscriptions**: Stock subscribe/unsubscribe requests by outcome
//! - **Fan-out**: Events published, messages delivered and dropped,
//!   fan-out latency
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Only
//! infrastructure records metrics; domain and application code stays
//! free of recording calls.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if called more than once or if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Session gauges
    describe_gauge!(
        "order_hub_sessions_connected",
        "Number of connected WebSocket sessions"
    );
    describe_gauge!(
        "order_hub_sessions_authenticated",
        "Number of sessions bound to a user"
    );
    describe_gauge!(
        "order_hub_topics",
        "Number of topics with at least one member"
    );

    // Request counters
    describe_counter!(
        "order_hub_logins_total",
        "Total login attempts by outcome"
    );
    describe_counter!(
        "order_hub_subscriptions_total",
        "Total subscribe/unsubscribe requests by action and outcome"
    );

    // Fan-out counters
    describe_counter!(
        "order_hub_events_published_total",
        "Total order events published to the broadcast engine"
    );
    describe_counter!(
        "order_hub_messages_delivered_total",
        "Total messages queued to sessions by shape"
    );
    describe_counter!(
        "order_hub_messages_dropped_total",
        "Total per-session deliveries dropped"
    );

    // Latency histograms
    describe_histogram!(
        "order_hub_fanout_duration_seconds",
        "Time to fan one order event out to all eligible sessions"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for delivered message shapes.
#[derive(Debug, Clone, Copy)]
pub enum MessageShape {
    /// Full order record with identity fields.
    OrderUpdate,
    /// Reduced prices-only record.
    StockUpdate,
}

impl MessageShape {
    const fn as_str(self) -> &'static str {
        match self {
            Self::OrderUpdate => "order_update",
            Self::StockUpdate => "stock_update",
        }
    }
}

/// Metric labels for subscription actions.
#[derive(Debug, Clone, Copy)]
pub enum SubscriptionAction {
    /// A subscribe request.
    Subscribe,
    /// An unsubscribe request.
    Unsubscribe,
}

impl SubscriptionAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Record a login attempt and its outcome.
pub fn record_login(outcome: &'static str) {
    counter!(
        "order_hub_logins_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a subscribe or unsubscribe request and its outcome.
pub fn record_subscription(action: SubscriptionAction, outcome: &'static str) {
    counter!(
        "order_hub_subscriptions_total",
        "action" => action.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an order event handed to the broadcast engine.
pub fn record_event_published() {
    counter!("order_hub_events_published_total").increment(1);
}

/// Record messages queued to sessions.
pub fn record_messages_delivered(shape: MessageShape, count: u64) {
    counter!(
        "order_hub_messages_delivered_total",
        "shape" => shape.as_str()
    )
    .increment(count);
}

/// Record per-session deliveries dropped.
pub fn record_messages_dropped(count: u64) {
    counter!("order_hub_messages_dropped_total").increment(count);
}

/// Record the duration of one fan-out.
pub fn record_fanout_duration(duration: Duration) {
    histogram!("order_hub_fanout_duration_seconds").record(duration.as_secs_f64());
}

/// Update the connected session count.
pub fn set_sessions_connected(count: f64) {
    gauge!("order_hub_sessions_connected").set(count);
}

/// Update the authenticated session count.
pub fn set_sessions_authenticated(count: f64) {
    gauge!("order_hub_sessions_authenticated").set(count);
}

/// Update the populated topic count.
pub fn set_topics(count: f64) {
    gauge!("order_hub_topics").set(count);
}

// =============================================================================
// Tests
// =============================================================================
