//! Topic Membership Index
//!
//! Domain state for tracking which sessions belong to which topics.
//! Login enrolls a session into its role-derived topics, stock
//! subscriptions add and remove per-stock topics, and disconnect clears
//! a session everywhere in one step.
//!
//! # Design
//!
//! The index is bidirectional:
//! - topic → member sessions (resolved at fan-out time)
//! - session → joined topics (cleared at disconnect)
//!
//! Both maps live in one state struct behind one lock, so they are
//! mutual inverses at every observable point. Empty member sets are
//! pruned as the last session leaves.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::topic::Topic;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a connected session.
pub type SessionId = Uuid;

// =============================================================================
// Index State
// =============================================================================

/// The two membership maps, mutated together under one lock.
#[derive(Debug, Default)]
struct IndexState {
    /// Map from topic to its member sessions.
    topic_members: HashMap<Topic, HashSet<SessionId>>,
    /// Map from session to its joined topics.
    session_topics: HashMap<SessionId, HashSet<Topic>>,
}

impl IndexState {
    /// Add a membership. Returns `false` if it already existed.
    fn join(&mut self, session: SessionId, topic: Topic) -> bool {
        let joined = self
            .session_topics
            .entry(session)
            .or_default()
            .insert(topic.clone());

        if joined {
            self.topic_members.entry(topic).or_default().insert(session);
        }

        joined
    }

    /// Remove a membership. Returns `false` if it did not exist.
    fn leave(&mut self, session: SessionId, topic: &Topic) -> bool {
        let Some(topics) = self.session_topics.get_mut(&session) else {
            return false;
        };

        if !topics.remove(topic) {
            return false;
        }

        if topics.is_empty() {
            self.session_topics.remove(&session);
        }

        if let Some(members) = self.topic_members.get_mut(topic) {
            members.remove(&session);
            if members.is_empty() {
                self.topic_members.remove(topic);
            }
        }

        true
    }

    /// Remove a session from every topic. Returns the topics left.
    fn leave_all(&mut self, session: SessionId) -> Vec<Topic> {
        let Some(topics) = self.session_topics.remove(&session) else {
            return vec![];
        };

        for topic in &topics {
            if let Some(members) = self.topic_members.get_mut(topic) {
                members.remove(&session);
                if members.is_empty() {
                    self.topic_members.remove(topic);
                }
            }
        }

        topics.into_iter().collect()
    }
}

// =============================================================================
// Membership Index
// =============================================================================

/// Thread-safe bidirectional session ↔ topic membership index.
///
/// # Example
///
/// ```rust
/// use order_stream_hub::domain::membership::MembershipIndex;
/// use order_stream_hub::domain::topic::Topic;
/// use uuid::Uuid;
///
/// let index = MembershipIndex::new();
/// let session = Uuid::new_v4();
///
/// // Login joins the session into its derived topics
/// assert!(index.join(session, Topic::user("u1")));
/// assert!(index.join(session, Topic::stock("ACME")));
///
/// // Duplicate joins are idempotent
/// assert!(!index.join(session, Topic::stock("ACME")));
///
/// // Fan-out resolves topics back to sessions
/// assert_eq!(index.members_of(&Topic::stock("ACME")), vec![session]);
///
/// // Disconnect clears the session everywhere in one step
/// let left = index.leave_all(session);
/// assert_eq!(left.len(), 2);
/// assert!(index.members_of(&Topic::user("u1")).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MembershipIndex {
    state: RwLock<IndexState>,
}

impl MembershipIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Join a session into a topic.
    ///
    /// Returns `true` if the membership is new, `false` if the session
    /// was already a member (idempotent).
    pub fn join(&self, session: SessionId, topic: Topic) -> bool {
        self.state.write().join(session, topic)
    }

    /// Join a session into every topic in `topics`.
    ///
    /// Returns the number of memberships actually added.
    pub fn join_all(&self, session: SessionId, topics: impl IntoIterator<Item = Topic>) -> usize {
        let mut state = self.state.write();
        topics
            .into_iter()
            .filter(|topic| state.join(session, topic.clone()))
            .count()
    }

    /// Remove a session from a topic.
    ///
    /// Returns `true` if a membership was removed; leaving a topic never
    /// joined is a no-op.
    pub fn leave(&self, session: SessionId, topic: &Topic) -> bool {
        self.state.write().leave(session, topic)
    }

    /// Remove a session from every topic it joined.
    ///
    /// Returns the topics left, for disconnect logging. Unknown sessions
    /// return an empty list.
    pub fn leave_all(&self, session: SessionId) -> Vec<Topic> {
        self.state.write().leave_all(session)
    }

    /// Sessions currently in `topic`. Unknown topics resolve to an empty
    /// list, never an error.
    #[must_use]
    pub fn members_of(&self, topic: &Topic) -> Vec<SessionId> {
        self.state
            .read()
            .topic_members
            .get(topic)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Union of members across `topics`, deduplicated.
    ///
    /// This is the fan-out resolution step: a session in several target
    /// topics appears once.
    #[must_use]
    pub fn members_of_any<'a>(
        &self,
        topics: impl IntoIterator<Item = &'a Topic>,
    ) -> HashSet<SessionId> {
        let state = self.state.read();
        let mut sessions = HashSet::new();

        for topic in topics {
            if let Some(members) = state.topic_members.get(topic) {
                sessions.extend(members.iter().copied());
            }
        }

        sessions
    }

    /// Topics a session has joined.
    #[must_use]
    pub fn topics_of(&self, session: SessionId) -> Vec<Topic> {
        self.state
            .read()
            .session_topics
            .get(&session)
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a session is a member of a topic.
    #[must_use]
    pub fn is_member(&self, session: SessionId, topic: &Topic) -> bool {
        self.state
            .read()
            .session_topics
            .get(&session)
            .is_some_and(|topics| topics.contains(topic))
    }

    /// Current index statistics.
    #[must_use]
    pub fn stats(&self) -> MembershipStats {
        let state = self.state.read();
        MembershipStats {
            topic_count: state.topic_members.len(),
            session_count: state.session_topics.len(),
            membership_count: state.session_topics.values().map(HashSet::len).sum(),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of index size, surfaced through health and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipStats {
    /// Number of topics with at least one member.
    pub topic_count: usize,
    /// Number of sessions with at least one membership.
    pub session_count: usize,
    /// Total number of memberships.
    pub membership_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
