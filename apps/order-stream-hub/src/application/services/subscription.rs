//! Stock Subscriptions
//!
//! Joins and leaves per-stock topics for authenticated sessions.
//! Subscribing validates the stock against the directory; duplicate
//! subscribes and unsubscribes of never-joined topics are idempotent.

use std::sync::Arc;

use thiserror::Error;

use crate::application::ports::Directory;
use crate::application::services::registry::SessionRegistry;
use crate::domain::membership::{MembershipIndex, SessionId};
use crate::domain::topic::Topic;

// =============================================================================
// Error Types
// =============================================================================

/// Errors a subscribe request can fail with.
///
/// Failures are reported to the requesting session only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubError {
    /// The session has no bound user yet.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// The stock code is not listed in the directory.
    #[error("stock code is not listed")]
    InvalidStockCode,
}

// =============================================================================
// Subscription Service
// =============================================================================

/// Handles per-stock topic subscribe and unsubscribe requests.
pub struct SubscriptionService {
    directory: Arc<dyn Directory>,
    registry: Arc<SessionRegistry>,
    index: Arc<MembershipIndex>,
}

impl SubscriptionService {
    /// Create a subscription service over the given directory, registry,
    /// and membership index.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        registry: Arc<SessionRegistry>,
        index: Arc<MembershipIndex>,
    ) -> Self {
        Self {
            directory,
            registry,
            index,
        }
    }

    /// Join the per-stock topic for `code`.
    ///
    /// Duplicate subscribes succeed without adding a second membership.
    ///
    /// # Errors
    ///
    /// - [`SubError::NotAuthenticated`] if the session has no bound user
    /// - [`SubError::InvalidStockCode`] if the code is not listed
    pub fn subscribe(&self, session: SessionId, code: &str) -> Result<(), SubError> {
        if !self.registry.is_authenticated(session) {
            return Err(SubError::NotAuthenticated);
        }

        if !self.directory.is_valid_stock(code) {
            return Err(SubError::InvalidStockCode);
        }

        let newly_joined = self.index.join(session, Topic::stock(code));
        tracing::debug!(
            session = %session,
            stock = code,
            newly_joined,
            "Stock subscribed"
        );

        Ok(())
    }

    /// Leave the per-stock topic for `code`.
    ///
    /// Idempotent and infallible: leaving a topic never joined, or from
    /// a session that never authenticated, is a no-op.
    pub fn unsubscribe(&self, session: SessionId, code: &str) {
        let was_member = self.index.leave(session, &Topic::stock(code));
        tracing::debug!(
            session = %session,
            stock = code,
            was_member,
            "Stock unsubscribed"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
