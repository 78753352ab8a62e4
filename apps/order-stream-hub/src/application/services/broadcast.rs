//! Broadcast Fan-Out Engine
//!
//! Turns one order event into per-session deliveries in three steps:
//!
//! 1. **Private targets**: walk the user directory; users whose
//!    watchlist contains the event's stock AND whose role rule admits
//!    the acting user are targeted on their `user/<id>` topic.
//! 2. **Admin**: the `admin` topic is targeted unconditionally.
//! 3. **Per-stock**: members of `stock/<code>` receive the reduced
//!    prices-only shape.
//!
//! Target topics for the full shape are resolved to sessions as a
//! deduplicated union, so a session reachable through several topics
//! gets the full record once. A session may still receive one full and
//! one reduced message for the same event; those are distinct shapes.
//!
//! Fan-outs are serialized by an engine-internal lock, which keeps
//! per-stock delivery order equal to publish order for every receiving
//! session. Delivery itself never blocks and never fails the fan-out;
//! per-session drops are counted in the report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::application::ports::Directory;
use crate::application::protocol::ServerEvent;
use crate::application::services::registry::SessionRegistry;
use crate::domain::membership::{MembershipIndex, SessionId};
use crate::domain::order::{OrderEvent, PriceUpdate};
use crate::domain::topic::Topic;

// =============================================================================
// Fan-Out Report
// =============================================================================

/// Delivery accounting for one published event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Private user topics targeted by the watchlist and role rule.
    pub private_topics: usize,
    /// Sessions the full order update was queued for.
    pub order_updates: usize,
    /// Sessions the reduced stock update was queued for.
    pub stock_updates: usize,
    /// Per-session deliveries dropped (queue full, closed, or gone).
    pub dropped: usize,
    /// Time spent planning and dispatching.
    pub elapsed: Duration,
}

// =============================================================================
// Broadcast Engine
// =============================================================================

/// Fans order events out to eligible sessions.
pub struct BroadcastEngine {
    directory: Arc<dyn Directory>,
    registry: Arc<SessionRegistry>,
    index: Arc<MembershipIndex>,
    /// Serializes fan-outs; held across plan and dispatch, never across
    /// an await point.
    fanout_lock: Mutex<()>,
}

impl BroadcastEngine {
    /// Create a broadcast engine over the given directory, registry, and
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
            fanout_lock: Mutex::new(()),
        }
    }

    /// Fan one order event out to every eligible session.
    ///
    /// Empty recipient sets at any step are normal operation, never an
    /// error.
    #[must_use]
    pub fn publish(&self, event: &OrderEvent) -> FanOutReport {
        let _serialized = self.fanout_lock.lock();
        let started = Instant::now();
        let mut report = FanOutReport::default();

        // Steps 1+2: full shape to private topics and admin
        let mut order_topics: Vec<Topic> = self
            .directory
            .users()
            .iter()
            .filter(|user| user.watches(&event.stock_code) && user.may_view_order(event))
            .map(|user| Topic::user(user.user_id.clone()))
            .collect();
        report.private_topics = order_topics.len();
        order_topics.push(Topic::Admin);

        let order_recipients = self.index.members_of_any(order_topics.iter());
        let order_update = ServerEvent::OrderUpdate(event.clone());
        report.order_updates =
            self.dispatch(order_recipients.iter().copied(), &order_update, &mut report.dropped);

        // Step 3: reduced shape to the per-stock topic
        let stock_recipients = self.index.members_of(&Topic::stock(event.stock_code.clone()));
        let stock_update = ServerEvent::StockUpdate(PriceUpdate::from(event));
        report.stock_updates =
            self.dispatch(stock_recipients.iter().copied(), &stock_update, &mut report.dropped);

        report.elapsed = started.elapsed();

        tracing::debug!(
            stock = %event.stock_code,
            acting_user = %event.user_id,
            private_topics = report.private_topics,
            order_updates = report.order_updates,
            stock_updates = report.stock_updates,
            dropped = report.dropped,
            "Order event fanned out"
        );

        report
    }

    /// Deliver one event to each session, counting drops.
    fn dispatch(
        &self,
        sessions: impl Iterator<Item = SessionId>,
        event: &ServerEvent,
        dropped: &mut usize,
    ) -> usize {
        let mut delivered = 0;

        for session in sessions {
            let outcome = self.registry.deliver(session, event);
            if outcome.is_delivered() {
                delivered += 1;
            } else {
                *dropped += 1;
                tracing::debug!(
                    session = %session,
                    event = event.label(),
                    outcome = outcome.label(),
                    "Delivery dropped"
                );
            }
        }

        delivered
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    use crate::application::ports::MockDirectory;
    use crate::domain::directory::{Role, User};

    use super::*;

    fn event_for(stock: &str, acting_user: &str, acting_bank: &str) -> OrderEvent {
        OrderEvent {
            stock_code: stock.to_string(),
            market_price: Decimal::new(1000, 2),
            matched_price: Decimal::new(999, 2),
            user_id: acting_user.to_string(),
            bank_id: acting_bank.to_string(),
        }
    }

    fn user(id: &str, role: Role, watchlist: &[&str]) -> User {
        User {
            user_id: id.to_string(),
            user_name: format!("User {id}"),
            role,
            watchlist: watchlist.iter().map(ToString::to_string).collect(),
            bank_id: None,
        }
    }

    fn engine_with(
        users: Vec<User>,
    ) -> (BroadcastEngine, Arc<SessionRegistry>, Arc<MembershipIndex>) {
        let mut directory = MockDirectory::new();
        directory.expect_users().returning(move || users.clone());

        let registry = Arc::new(SessionRegistry::new());
        let index = Arc::new(MembershipIndex::new());
        let engine = BroadcastEngine::new(
            Arc::new(directory),
            Arc::clone(&registry),
            Arc::clone(&index),
        );
        (engine, registry, index)
    }

    /// Register a session and join it into the given topics.
    fn join_session(
        registry: &SessionRegistry,
        index: &MembershipIndex,
        topics: &[Topic],
        capacity: usize,
    ) -> (SessionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = registry.register(tx);
        for topic in topics {
            index.join(session, topic.clone());
        }
        (session, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn admin_in_private_and_admin_topics_gets_one_order_update() {
        let (engine, registry, index) =
            engine_with(vec![user("a1", Role::Admin, &["ACME"])]);

        // Admin session is reachable through user/a1 AND admin
        let (_, mut rx) = join_session(
            &registry,
            &index,
            &[Topic::user("a1"), Topic::Admin],
            8,
        );

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.private_topics, 1);
        assert_eq!(report.order_updates, 1);
        assert_eq!(report.dropped, 0);

        let received = drain(&mut rx);
        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], ServerEvent::OrderUpdate(_)));
    }

    #[tokio::test]
    async fn private_delivery_needs_watchlist_and_role_rule() {
        // u2 watches the stock but the customer rule rejects foreign
        // orders; u3's rule would accept but nothing is watched.
        let (engine, registry, index) = engine_with(vec![
            user("u2", Role::Customer, &["ACME"]),
            user("u3", Role::Admin, &[]),
        ]);

        let (_, mut rx2) = join_session(&registry, &index, &[Topic::user("u2")], 8);
        let (_, mut rx3) = join_session(&registry, &index, &[Topic::user("u3")], 8);

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.private_topics, 0);
        assert_eq!(report.order_updates, 0);
        assert!(drain(&mut rx2).is_empty());
        assert!(drain(&mut rx3).is_empty());
    }

    #[tokio::test]
    async fn broker_sees_managed_account_orders() {
        let broker = Role::Broker {
            accounts: ["u1".to_string()].into_iter().collect(),
        };
        let (engine, registry, index) =
            engine_with(vec![user("bk1", broker, &["ACME"])]);

        let (_, mut rx) = join_session(&registry, &index, &[Topic::user("bk1")], 8);

        let report = engine.publish(&event_for("ACME", "u1", "b1"));
        assert_eq!(report.order_updates, 1);

        let report = engine.publish(&event_for("ACME", "u9", "b1"));
        assert_eq!(report.order_updates, 0);

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn bank_sees_managed_bank_orders() {
        let bank = Role::Bank {
            banks: ["b1".to_string()].into_iter().collect(),
        };
        let (engine, registry, index) =
            engine_with(vec![user("bn1", bank, &["ACME"])]);

        let (_, mut rx) = join_session(&registry, &index, &[Topic::user("bn1")], 8);

        let _ = engine.publish(&event_for("ACME", "u1", "b1"));
        let _ = engine.publish(&event_for("ACME", "u1", "b2"));
        let _ = engine.publish(&event_for("ACME", "u1", ""));

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn stock_subscribers_get_reduced_shape_only() {
        let (engine, registry, index) = engine_with(vec![]);

        let (_, mut rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 8);

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.stock_updates, 1);
        assert_eq!(report.order_updates, 0);

        let received = drain(&mut rx);
        assert_eq!(received.len(), 1);
        match &received[0] {
            ServerEvent::StockUpdate(update) => assert_eq!(update.stock_code, "ACME"),
            other => panic!("expected stock update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn session_can_get_both_shapes_for_one_event() {
        let (engine, registry, index) =
            engine_with(vec![user("u1", Role::Customer, &["ACME"])]);

        // Own order, watched stock, and stock-subscribed
        let (_, mut rx) = join_session(
            &registry,
            &index,
            &[Topic::user("u1"), Topic::stock("ACME")],
            8,
        );

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.order_updates, 1);
        assert_eq!(report.stock_updates, 1);

        let received = drain(&mut rx);
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], ServerEvent::OrderUpdate(_)));
        assert!(matches!(received[1], ServerEvent::StockUpdate(_)));
    }

    #[tokio::test]
    async fn events_for_unwatched_stock_still_reach_admin_topic() {
        let (engine, registry, index) = engine_with(vec![user("a1", Role::Admin, &[])]);

        let (_, mut rx) = join_session(&registry, &index, &[Topic::Admin], 8);

        let report = engine.publish(&event_for("OBSCURE", "u1", "b1"));

        assert_eq!(report.private_topics, 0);
        assert_eq!(report.order_updates, 1);
        assert_eq!(report.stock_updates, 0);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn empty_recipient_sets_are_normal() {
        let (engine, _registry, _index) = engine_with(vec![]);

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.order_updates, 0);
        assert_eq!(report.stock_updates, 0);
        assert_eq!(report.dropped, 0);
    }

    #[tokio::test]
    async fn slow_consumer_drops_are_counted_and_isolated() {
        let (engine, registry, index) = engine_with(vec![]);

        // Queue holds one event; the second fan-out overflows it
        let (_, mut slow_rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 1);
        let (_, mut healthy_rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 8);

        let first = engine.publish(&event_for("ACME", "u1", "b1"));
        let second = engine.publish(&event_for("ACME", "u2", "b1"));

        assert_eq!(first.dropped, 0);
        assert_eq!(second.stock_updates, 1);
        assert_eq!(second.dropped, 1);

        assert_eq!(drain(&mut slow_rx).len(), 1);
        assert_eq!(drain(&mut healthy_rx).len(), 2);
    }

    #[tokio::test]
    async fn per_stock_delivery_order_matches_publish_order() {
        let (engine, registry, index) = engine_with(vec![]);

        let (_, mut rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 8);

        for cents in [100, 200, 300] {
            let mut event = event_for("ACME", "u1", "b1");
            event.matched_price = Decimal::new(cents, 2);
            let _ = engine.publish(&event);
        }

        let prices: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|event| match event {
                ServerEvent::StockUpdate(update) => update.matched_price,
                other => panic!("expected stock update, got {other:?}"),
            })
            .collect();

        assert_eq!(
            prices,
            vec![Decimal::new(100, 2), Decimal::new(200, 2), Decimal::new(300, 2)]
        );
    }

    #[tokio::test]
    async fn disconnected_session_is_counted_not_fatal() {
        let (engine, registry, index) = engine_with(vec![]);

        let (session, rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 8);
        let (_, mut live_rx) = join_session(&registry, &index, &[Topic::stock("ACME")], 8);

        // Torn down registry-side but still in the index: the losing
        // side of a disconnect race
        drop(rx);
        registry.unregister(session);

        let report = engine.publish(&event_for("ACME", "u1", "b1"));

        assert_eq!(report.stock_updates, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(drain(&mut live_rx).len(), 1);
    }
}
