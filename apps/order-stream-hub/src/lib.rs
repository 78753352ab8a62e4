#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Order Stream Hub - Real-Time Order Update Fan-Out
//!
//! A WebSocket hub that binds client sessions to directory users, tracks
//! their topic memberships, and fans order events out with per-role
//! visibility filtering. Private order records go to eligible watchers
//! and admins; reduced price records go to per-stock subscribers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core identity, topic, and membership types
//!   - `directory`: user records, roles, and the order visibility rule
//!   - `order`: full and reduced order event shapes
//!   - `topic`: the topic grammar sessions join and events target
//!   - `membership`: bidirectional session/topic index
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: directory lookup and update source contracts
//!   - `protocol`: JSON wire messages
//!   - `services`: session registry, login, subscriptions, fan-out
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `directory`: JSON file directory adapter
//!   - `gateway`: WebSocket server speaking the wire protocol
//!   - `feed`: timer-driven simulated order source
//!   - `config`: environment configuration
//!   - `health`: health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Simulated ──► Broadcast ──► Session ──► WS Client 1
//!   Feed         Engine       Queues  ──► WS Client 2
//!                  ▲                  ──► WS Client N
//!          Directory + Membership
//!            (login/subscribe via Gateway)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core identity, topic, and membership types.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::directory::{BankId, Role, StockCode, User, UserId};
pub use domain::membership::{MembershipIndex, MembershipStats, SessionId};
pub use domain::order::{OrderEvent, PriceUpdate};
pub use domain::topic::{Topic, TopicParseError};

// Ports and wire protocol
pub use application::ports::{Directory, UpdateSource, UpdateSourceError};
pub use application::protocol::{ClientRequest, ServerEvent};

// Session services
pub use application::services::{
    AuthError, AuthService, BroadcastEngine, DeliveryOutcome, FanOutReport, LoginOutcome,
    RegistryStats, SessionRegistry, SubError, SubscriptionService,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, DeliverySettings, FeedSettings, HubConfig, ServerSettings,
};

// Directory adapter
pub use infrastructure::directory::{DirectoryError, JsonDirectory};

// Gateway
pub use infrastructure::gateway::{GatewayError, GatewayServer};

// Simulated feed
pub use infrastructure::feed::{FeedStatus, SimulatedFeed};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
