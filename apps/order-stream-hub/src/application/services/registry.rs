//! Session Registry
//!
//! Tracks live client sessions: their identity binding and their
//! outbound delivery queue. Every message the hub sends to a client,
//! request responses and broadcast fan-out alike, passes through
//! [`SessionRegistry::deliver`], which makes per-session delivery the
//! single observable unit of work.
//!
//! # Delivery Policy
//!
//! Outbound queues are bounded. Delivery never blocks: a full or closed
//! queue drops the message for that session only and reports the
//! outcome, so one slow consumer cannot stall a fan-out.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::protocol::ServerEvent;
use crate::domain::directory::User;
use crate::domain::membership::SessionId;

// =============================================================================
// Types
// =============================================================================

/// One live session: optional user binding plus outbound queue sender.
#[derive(Debug)]
struct SessionEntry {
    /// User bound at login; `None` until then. The first binding wins.
    user: Option<User>,
    /// Sender side of the session's outbound queue.
    outbound: mpsc::Sender<ServerEvent>,
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The event was queued for the session.
    Delivered,
    /// The session's outbound queue was full; the event was dropped.
    QueueFull,
    /// The session's outbound queue was closed; the event was dropped.
    Closed,
    /// No such session (already unregistered); the event was dropped.
    UnknownSession,
}

impl DeliveryOutcome {
    /// Whether the event reached the session's queue.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Short label for delivery logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
            Self::UnknownSession => "unknown_session",
        }
    }
}

/// Snapshot of registry size, surfaced through health and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of connected sessions.
    pub connected: usize,
    /// Number of sessions bound to a user.
    pub authenticated: usize,
}

// =============================================================================
// Session Registry
// =============================================================================

/// Thread-safe registry of live sessions and their outbound queues.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session around its outbound queue sender.
    ///
    /// Returns the freshly assigned session id.
    pub fn register(&self, outbound: mpsc::Sender<ServerEvent>) -> SessionId {
        let session = Uuid::new_v4();
        self.sessions.write().insert(
            session,
            SessionEntry {
                user: None,
                outbound,
            },
        );
        session
    }

    /// Bind a user to a session. The first binding wins.
    ///
    /// Returns `false` if the session is unknown or already bound.
    pub fn bind_user(&self, session: SessionId, user: User) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&session) {
            Some(entry) if entry.user.is_none() => {
                entry.user = Some(user);
                true
            }
            _ => false,
        }
    }

    /// The user bound to a session, if any.
    #[must_use]
    pub fn user_of(&self, session: SessionId) -> Option<User> {
        self.sessions
            .read()
            .get(&session)
            .and_then(|entry| entry.user.clone())
    }

    /// Whether a session is bound to a user.
    #[must_use]
    pub fn is_authenticated(&self, session: SessionId) -> bool {
        self.sessions
            .read()
            .get(&session)
            .is_some_and(|entry| entry.user.is_some())
    }

    /// Attempt to queue an event for one session.
    ///
    /// Never blocks; the outcome reports queue-full and closed-queue
    /// drops so the caller can count them.
    #[must_use]
    pub fn deliver(&self, session: SessionId, event: &ServerEvent) -> DeliveryOutcome {
        let sessions = self.sessions.read();
        let Some(entry) = sessions.get(&session) else {
            return DeliveryOutcome::UnknownSession;
        };

        match entry.outbound.try_send(event.clone()) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => DeliveryOutcome::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }

    /// Remove a session, dropping its outbound sender.
    ///
    /// Returns `false` if the session was already gone.
    pub fn unregister(&self, session: SessionId) -> bool {
        self.sessions.write().remove(&session).is_some()
    }

    /// Current registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.read();
        RegistryStats {
            connected: sessions.len(),
            authenticated: sessions
                .values()
                .filter(|entry| entry.user.is_some())
                .count(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
