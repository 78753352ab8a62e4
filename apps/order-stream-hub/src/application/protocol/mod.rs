//! Client Wire Protocol
//!
//! JSON message types exchanged with clients over WebSocket text frames.
//! Inbound frames parse into [`ClientRequest`]; everything the hub sends,
//! request responses and broadcasts alike, is a [`ServerEvent`].
//!
//! # Message Types
//!
//! ## Requests (client → hub)
//! - `login`: bind the session to a directory user
//! - `subscribe`: join a per-stock price topic
//! - `unsubscribe`: leave a per-stock price topic
//!
//! ## Responses (hub → requesting session only)
//! - `login_success` / `login_failed`
//! - `subscribe_success` / `subscribe_failed`
//! - `unsubscribe_success`
//!
//! ## Broadcasts (hub → topic members)
//! - `order_update`: full order record, private and admin delivery
//! - `stock_update`: reduced prices-only record, per-stock delivery
//!
//! Failure reasons are short client-facing strings ("User not found",
//! "Invalid stock code", "Not authenticated", "Already authenticated");
//! richer diagnostics stay in the server logs.

use serde::{Deserialize, Serialize};

use crate::domain::directory::User;
use crate::domain::order::{OrderEvent, PriceUpdate};

// =============================================================================
// Client Requests
// =============================================================================

/// A request sent by a client.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "login", "user_id": "u1"}
/// {"type": "subscribe", "stock_code": "ACME"}
/// {"type": "unsubscribe", "stock_code": "ACME"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Bind this session to the user with the given id.
    Login {
        /// Login credential: the directory user id.
        user_id: String,
    },

    /// Join the per-stock topic for `stock_code`.
    Subscribe {
        /// Stock code to subscribe to.
        stock_code: String,
    },

    /// Leave the per-stock topic for `stock_code`.
    Unsubscribe {
        /// Stock code to unsubscribe from.
        stock_code: String,
    },
}

// =============================================================================
// Server Events
// =============================================================================

/// A message sent by the hub to one session.
///
/// Responses answer a request on the requesting session only; broadcast
/// shapes are delivered to topic members and are never used for errors.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "login_success", "user": {"user_id": "u1", "...": "..."}}
/// {"type": "login_failed", "reason": "User not found"}
/// {"type": "subscribe_success", "stock_code": "ACME"}
/// {"type": "subscribe_failed", "reason": "Invalid stock code"}
/// {"type": "unsubscribe_success", "stock_code": "ACME"}
/// {"type": "order_update", "stock_code": "ACME", "market_price": "42.17",
///  "matched_price": "42.15", "user_id": "u1", "bank_id": "b7"}
/// {"type": "stock_update", "stock_code": "ACME", "market_price": "42.17",
///  "matched_price": "42.15"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Login succeeded; carries the resolved directory record.
    LoginSuccess {
        /// The user now bound to the session.
        user: User,
    },

    /// Login failed.
    LoginFailed {
        /// Client-facing failure reason.
        reason: String,
    },

    /// Stock subscription succeeded.
    SubscribeSuccess {
        /// The stock code now subscribed.
        stock_code: String,
    },

    /// Stock subscription failed.
    SubscribeFailed {
        /// Client-facing failure reason.
        reason: String,
    },

    /// Stock unsubscription completed (idempotent, always succeeds).
    UnsubscribeSuccess {
        /// The stock code unsubscribed.
        stock_code: String,
    },

    /// Full order record for private and admin topic members.
    OrderUpdate(OrderEvent),

    /// Reduced prices-only record for per-stock topic members.
    StockUpdate(PriceUpdate),
}

impl ServerEvent {
    /// Short label for logs and delivery metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LoginSuccess { .. } => "login_success",
            Self::LoginFailed { .. } => "login_failed",
            Self::SubscribeSuccess { .. } => "subscribe_success",
            Self::SubscribeFailed { .. } => "subscribe_failed",
            Self::UnsubscribeSuccess { .. } => "unsubscribe_success",
            Self::OrderUpdate(_) => "order_update",
            Self::StockUpdate(_) => "stock_update",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
