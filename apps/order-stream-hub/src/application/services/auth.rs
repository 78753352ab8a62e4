//! Login and Topic Enrollment
//!
//! Resolves a login credential against the directory, binds the resolved
//! user to the session, and enrolls the session into its role-derived
//! topic set.
//!
//! # Initial Topics
//!
//! | Role     | Topics joined at login                                   |
//! |----------|----------------------------------------------------------|
//! | any      | `user/<own id>` plus `stock/<code>` per watchlist entry  |
//! | admin    | + `admin`                                                |
//! | broker   | + `user/<account>` per managed account                   |
//! | bank     | + `bank/<bank>` per managed bank                         |
//! | customer | nothing extra                                            |
//!
//! A session that never logs in joins nothing and receives no broadcast
//! traffic.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::application::ports::Directory;
use crate::application::services::registry::SessionRegistry;
use crate::domain::directory::{Role, User};
use crate::domain::membership::{MembershipIndex, SessionId};
use crate::domain::topic::Topic;

// =============================================================================
// Error Types
// =============================================================================

/// Errors a login attempt can fail with.
///
/// Failures are reported to the requesting session only; the session
/// stays connected and may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The credential did not resolve to a directory user.
    #[error("user not found in directory")]
    UserNotFound,

    /// The session is already bound to a user; the first binding stays.
    #[error("session is already authenticated")]
    AlreadyAuthenticated,

    /// The session disconnected while the login was processed.
    #[error("session closed during login")]
    SessionClosed,
}

// =============================================================================
// Login Outcome
// =============================================================================

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The user now bound to the session.
    pub user: User,
    /// Topics the session was enrolled into, in derivation order.
    pub topics: Vec<Topic>,
}

// =============================================================================
// Auth Service
// =============================================================================

/// Handles login requests and initial topic enrollment.
pub struct AuthService {
    directory: Arc<dyn Directory>,
    registry: Arc<SessionRegistry>,
    index: Arc<MembershipIndex>,
}

impl AuthService {
    /// Create an auth service over the given directory, registry, and
    /// membership index.
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

    /// Bind `user_id` to `session` and enroll its initial topics.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AlreadyAuthenticated`] if the session is bound
    /// - [`AuthError::UserNotFound`] if the credential is unknown
    /// - [`AuthError::SessionClosed`] if the session vanished mid-login
    pub fn login(&self, session: SessionId, user_id: &str) -> Result<LoginOutcome, AuthError> {
        if self.registry.is_authenticated(session) {
            return Err(AuthError::AlreadyAuthenticated);
        }

        let user = self
            .directory
            .find_user(user_id)
            .ok_or(AuthError::UserNotFound)?;

        if !self.registry.bind_user(session, user.clone()) {
            return Err(AuthError::SessionClosed);
        }

        let topics = initial_topics(&user);
        self.index.join_all(session, topics.iter().cloned());

        tracing::info!(
            session = %session,
            user_id = %user.user_id,
            role = user.role.label(),
            topics = topics.len(),
            "Session authenticated"
        );

        Ok(LoginOutcome { user, topics })
    }
}

// =============================================================================
// Topic Derivation
// =============================================================================

/// Derive the topics a user joins at login.
///
/// Order: own private topic, role extras, watchlist stocks. Duplicates
/// (a broker managing itself, repeated watchlist entries) appear once.
#[must_use]
pub fn initial_topics(user: &User) -> Vec<Topic> {
    let mut topics = vec![Topic::user(user.user_id.clone())];

    match &user.role {
        Role::Admin => topics.push(Topic::Admin),
        Role::Broker { accounts } => {
            topics.extend(accounts.iter().map(|account| Topic::user(account.clone())));
        }
        Role::Bank { banks } => {
            topics.extend(banks.iter().map(|bank| Topic::bank(bank.clone())));
        }
        Role::Customer => {}
    }

    topics.extend(user.watchlist.iter().map(|code| Topic::stock(code.clone())));

    let mut seen = HashSet::new();
    topics.retain(|topic| seen.insert(topic.clone()));
    topics
}

// =============================================================================
// Tests
// =============================================================================
