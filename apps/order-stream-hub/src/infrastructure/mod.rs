//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loading from environment variables.
pub mod config;

/// JSON-file-backed directory adapter.
pub mod directory;

/// Simulated order update source.
pub mod feed;

/// WebSocket gateway for client sessions.
pub mod gateway;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
