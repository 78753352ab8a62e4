//! Directory Records
//!
//! Users, roles, and the order visibility rule. The directory is the
//! read-only source of identity: login resolves a credential to a
//! [`User`], and the broadcast engine consults each user's role to decide
//! who may see an order.
//!
//! # Visibility
//!
//! [`Role::may_view`] is the single place order visibility is decided:
//!
//! - `Admin` sees every order
//! - `Broker` sees orders acted by its managed accounts
//! - `Bank` sees orders acted through its managed banks
//! - `Customer` sees only their own orders
//!
//! The watchlist gate for private delivery is applied by the broadcast
//! engine on top of this rule; it is not part of the rule itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::order::OrderEvent;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a directory user (also the login credential).
pub type UserId = String;

/// Identifier for a bank.
pub type BankId = String;

/// A stock ticker code.
pub type StockCode = String;

// =============================================================================
// Roles
// =============================================================================

/// Access role of a directory user.
///
/// Each variant carries the data its visibility rule needs, so the rule
/// lives in exactly one place ([`Role::may_view`]) and cannot drift
/// between role checks scattered across handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Role {
    /// Operations role: sees every order update.
    Admin,

    /// Broker managing a set of customer accounts.
    Broker {
        /// User ids of the accounts this broker manages.
        accounts: HashSet<UserId>,
    },

    /// Bank user managing a set of banks.
    Bank {
        /// Bank ids this user manages.
        banks: HashSet<BankId>,
    },

    /// Customer: sees only their own orders.
    Customer,
}

impl Role {
    /// Decide whether a user holding this role may view an order acted
    /// by `acting_user` through `acting_bank`.
    ///
    /// `own_id` is the id of the viewing user; only the customer rule
    /// consults it.
    #[must_use]
    pub fn may_view(&self, own_id: &str, acting_user: &str, acting_bank: &str) -> bool {
        match self {
            Self::Admin => true,
            Self::Broker { accounts } => accounts.contains(acting_user),
            Self::Bank { banks } => banks.contains(acting_bank),
            Self::Customer => own_id == acting_user,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Broker { .. } => "broker",
            Self::Bank { .. } => "bank",
            Self::Customer => "customer",
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// A directory user record.
///
/// Resolved at login and bound to the session for its lifetime. The full
/// record travels back to the client in the login success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id (the login credential).
    pub user_id: UserId,

    /// Display name.
    pub user_name: String,

    /// Access role with its visibility data.
    pub role: Role,

    /// Stock codes whose order updates this user wants privately.
    #[serde(default)]
    pub watchlist: Vec<StockCode>,

    /// Bank this user acts through, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<BankId>,
}

impl User {
    /// Whether `code` is on this user's watchlist.
    #[must_use]
    pub fn watches(&self, code: &str) -> bool {
        self.watchlist.iter().any(|c| c == code)
    }

    /// Apply the role rule to an order event.
    #[must_use]
    pub fn may_view_order(&self, event: &OrderEvent) -> bool {
        self.role
            .may_view(&self.user_id, &event.user_id, &event.bank_id)
    }
}

// =============================================================================
// Tests
// =============================================================================
