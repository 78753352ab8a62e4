//! Hub Configuration Settings
//!
//! Configuration types for the order stream hub, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// WebSocket gateway port.
    pub ws_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_port: 8090,
            health_port: 8091,
        }
    }
}

/// Update feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Whether the simulated feed runs at all.
    pub enabled: bool,
    /// Interval between simulated order events.
    pub interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(5_000),
        }
    }
}

/// Per-session delivery settings.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Capacity of each session's outbound queue. A full queue drops
    /// messages for that session only.
    pub session_queue_capacity: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            session_queue_capacity: 256,
        }
    }
}

/// Complete hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Path of the JSON directory file.
    pub directory_file: PathBuf,
    /// Server port settings.
    pub server: ServerSettings,
    /// Update feed settings.
    pub feed: FeedSettings,
    /// Per-session delivery settings.
    pub delivery: DeliverySettings,
}

impl HubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let directory_file = std::env::var("ORDER_HUB_DIRECTORY_FILE")
            .map_err(|_| ConfigError::MissingEnvVar("ORDER_HUB_DIRECTORY_FILE".to_string()))?;

        if directory_file.is_empty() {
            return Err(ConfigError::EmptyValue(
                "ORDER_HUB_DIRECTORY_FILE".to_string(),
            ));
        }

        let server = ServerSettings {
            ws_port: parse_env_u16("ORDER_HUB_WS_PORT", ServerSettings::default().ws_port),
            health_port: parse_env_u16(
                "ORDER_HUB_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let feed = FeedSettings {
            enabled: parse_env_bool("ORDER_HUB_FEED_ENABLED", FeedSettings::default().enabled),
            interval: parse_env_duration_millis(
                "ORDER_HUB_FEED_INTERVAL_MS",
                FeedSettings::default().interval,
            ),
        };

        let delivery = DeliverySettings {
            session_queue_capacity: parse_env_usize(
                "ORDER_HUB_SESSION_QUEUE_CAPACITY",
                DeliverySettings::default().session_queue_capacity,
            ),
        };

        Ok(Self {
            directory_file: PathBuf::from(directory_file),
            server,
            feed,
            delivery,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
