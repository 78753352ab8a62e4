//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Directory`]: read-only identity and stock lookup backing login,
//!   subscription validation, and fan-out planning
//! - [`UpdateSource`]: producer of order events; the bundled adapter is
//!   a timer-driven simulation, a market feed slots in behind the same
//!   contract

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::directory::{StockCode, User};

// =============================================================================
// Directory Port
// =============================================================================

/// Read-only directory of users and listed stocks.
///
/// Lookups are by exact id; there is no case folding. Snapshot accessors
/// exist because fan-out planning walks the whole user table per event
/// and the simulated feed samples uniformly from both tables.
#[cfg_attr(test, automock)]
pub trait Directory: Send + Sync {
    /// Resolve a user id to its directory record.
    fn find_user(&self, user_id: &str) -> Option<User>;

    /// Whether `code` is a listed stock.
    fn is_valid_stock(&self, code: &str) -> bool;

    /// Snapshot of every user record.
    fn users(&self) -> Vec<User>;

    /// Snapshot of every listed stock code.
    fn stock_codes(&self) -> Vec<StockCode>;
}

// =============================================================================
// Update Source Port
// =============================================================================

/// Errors an update source can stop with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateSourceError {
    /// The directory has no users to sample events from.
    #[error("directory has no users to sample")]
    NoUsers,

    /// The directory has no stocks to sample events from.
    #[error("directory has no stocks to sample")]
    NoStocks,
}

/// A producer of order events.
///
/// Runs until cancelled, handing each produced event to the broadcast
/// engine. Implementations decide cadence and content.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Drive the source until it is cancelled or fails.
    async fn run(self: Arc<Self>) -> Result<(), UpdateSourceError>;
}
