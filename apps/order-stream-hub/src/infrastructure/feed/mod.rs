//! Simulated Order Feed
//!
//! Timer-driven stand-in for an upstream order source. Every tick it
//! samples a random user and stock from the directory, fabricates an
//! order event with random two-decimal prices, and hands it to the
//! broadcast engine. Implements the [`UpdateSource`] port so a real
//! market feed can replace it without touching the fan-out path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Directory, UpdateSource, UpdateSourceError};
use crate::application::services::{BroadcastEngine, FanOutReport};
use crate::domain::order::OrderEvent;
use crate::infrastructure::metrics::{
    MessageShape, record_event_published, record_fanout_duration, record_messages_delivered,
    record_messages_dropped,
};

// =============================================================================
// Feed Status
// =============================================================================

/// Live feed state shared with the health endpoint.
#[derive(Debug)]
pub struct FeedStatus {
    running: AtomicBool,
    events_published: AtomicU64,
    last_event_at: RwLock<Option<DateTime<Utc>>>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatus {
    /// Create feed status with nothing published yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            events_published: AtomicU64::new(0),
            last_event_at: RwLock::new(None),
        }
    }

    /// Whether the feed loop is currently ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of events published since startup.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::SeqCst)
    }

    /// When the most recent event was published.
    #[must_use]
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.read()
    }

    /// Mark the feed loop as ticking or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Record one published event.
    pub fn record_event(&self) {
        self.events_published.fetch_add(1, Ordering::SeqCst);
        *self.last_event_at.write() = Some(Utc::now());
    }
}

// =============================================================================
// Simulated Feed
// =============================================================================

/// Generates random order events on a fixed interval.
pub struct SimulatedFeed {
    directory: Arc<dyn Directory>,
    engine: Arc<BroadcastEngine>,
    status: Arc<FeedStatus>,
    interval: Duration,
    cancel: CancellationToken,
}

impl SimulatedFeed {
    /// Create a simulated feed publishing into the given engine.
    #[must_use]
    pub const fn new(
        directory: Arc<dyn Directory>,
        engine: Arc<BroadcastEngine>,
        status: Arc<FeedStatus>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory,
            engine,
            status,
            interval,
            cancel,
        }
    }

    /// Sample one event, publish it, and record the outcome.
    ///
    /// Sync on purpose: the thread-local rng must not be held across an
    /// await point.
    fn publish_one(&self) {
        let users = self.directory.users();
        let stocks = self.directory.stock_codes();

        let mut rng = rand::rng();
        let (Some(user), Some(stock)) = (users.choose(&mut rng), stocks.choose(&mut rng)) else {
            return;
        };

        let event = OrderEvent {
            stock_code: stock.clone(),
            market_price: random_price(&mut rng),
            matched_price: random_price(&mut rng),
            user_id: user.user_id.clone(),
            bank_id: user.bank_id.clone().unwrap_or_default(),
        };

        let report = self.engine.publish(&event);
        self.status.record_event();
        record_fanout(&report);

        tracing::debug!(
            stock = %event.stock_code,
            acting_user = %event.user_id,
            order_updates = report.order_updates,
            stock_updates = report.stock_updates,
            "Simulated order published"
        );
    }
}

#[async_trait]
impl UpdateSource for SimulatedFeed {
    async fn run(self: Arc<Self>) -> Result<(), UpdateSourceError> {
        if self.directory.users().is_empty() {
            return Err(UpdateSourceError::NoUsers);
        }
        if self.directory.stock_codes().is_empty() {
            return Err(UpdateSourceError::NoStocks);
        }

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.status.set_running(true);
        tracing::info!(
            interval_ms = self.interval.as_millis(),
            "Simulated feed started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Simulated feed cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.publish_one();
                }
            }
        }

        self.status.set_running(false);
        Ok(())
    }
}

/// Random price in [0, 100) with two fractional digits.
fn random_price(rng: &mut impl Rng) -> Decimal {
    Decimal::new(rng.random_range(0..10_000), 2)
}

fn record_fanout(report: &FanOutReport) {
    record_event_published();
    record_messages_delivered(MessageShape::OrderUpdate, report.order_updates as u64);
    record_messages_delivered(MessageShape::StockUpdate, report.stock_updates as u64);
    record_messages_dropped(report.dropped as u64);
    record_fanout_duration(report.elapsed);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::application::ports::MockDirectory;
    use crate::application::protocol::ServerEvent;
    use crate::application::services::SessionRegistry;
    use crate::domain::directory::{Role, User};
    use crate::domain::membership::MembershipIndex;
    use crate::domain::topic::Topic;

    use super::*;

    fn single_user_directory() -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory.expect_users().returning(|| {
            vec![User {
                user_id: "u1".to_string(),
                user_name: "User One".to_string(),
                role: Role::Customer,
                watchlist: vec![],
                bank_id: Some("b1".to_string()),
            }]
        });
        directory
            .expect_stock_codes()
            .returning(|| vec!["ACME".to_string()]);
        directory
    }

    fn feed_with(
        directory: MockDirectory,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Arc<SimulatedFeed>, Arc<FeedStatus>, Arc<SessionRegistry>, Arc<MembershipIndex>) {
        let directory: Arc<dyn Directory> = Arc::new(directory);
        let registry = Arc::new(SessionRegistry::new());
        let index = Arc::new(MembershipIndex::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&directory),
            Arc::clone(&registry),
            Arc::clone(&index),
        ));
        let status = Arc::new(FeedStatus::new());
        let feed = Arc::new(SimulatedFeed::new(
            directory,
            engine,
            Arc::clone(&status),
            interval,
            cancel,
        ));
        (feed, status, registry, index)
    }

    #[test]
    fn status_starts_empty() {
        let status = FeedStatus::new();
        assert!(!status.is_running());
        assert_eq!(status.events_published(), 0);
        assert!(status.last_event_at().is_none());
    }

    #[test]
    fn status_records_events() {
        let status = FeedStatus::new();
        status.record_event();
        status.record_event();
        assert_eq!(status.events_published(), 2);
        assert!(status.last_event_at().is_some());
    }

    #[tokio::test]
    async fn errors_when_directory_has_no_users() {
        let mut directory = MockDirectory::new();
        directory.expect_users().returning(Vec::new);
        directory
            .expect_stock_codes()
            .returning(|| vec!["ACME".to_string()]);

        let (feed, status, _, _) =
            feed_with(directory, Duration::from_millis(10), CancellationToken::new());

        assert_eq!(feed.run().await, Err(UpdateSourceError::NoUsers));
        assert!(!status.is_running());
    }

    #[tokio::test]
    async fn errors_when_directory_has_no_stocks() {
        let mut directory = MockDirectory::new();
        directory.expect_users().returning(|| {
            vec![User {
                user_id: "u1".to_string(),
                user_name: "User One".to_string(),
                role: Role::Customer,
                watchlist: vec![],
                bank_id: None,
            }]
        });
        directory.expect_stock_codes().returning(Vec::new);

        let (feed, _, _, _) =
            feed_with(directory, Duration::from_millis(10), CancellationToken::new());

        assert_eq!(feed.run().await, Err(UpdateSourceError::NoStocks));
    }

    #[tokio::test]
    async fn publishes_sampled_events_into_the_engine() {
        let cancel = CancellationToken::new();
        let (feed, status, registry, index) =
            feed_with(single_user_directory(), Duration::from_millis(10), cancel.clone());

        // A stock subscriber observes the reduced shape of every event
        let (tx, mut rx) = mpsc::channel(8);
        let session = registry.register(tx);
        index.join(session, Topic::stock("ACME"));

        let handle = tokio::spawn(feed.run());

        let received = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("feed should publish within the timeout")
            .expect("session channel should stay open");

        match received {
            ServerEvent::StockUpdate(update) => {
                assert_eq!(update.stock_code, "ACME");
                assert!(update.market_price >= Decimal::ZERO);
                assert!(update.market_price < Decimal::new(10_000, 2));
            }
            other => panic!("expected stock update, got {other:?}"),
        }

        assert!(status.is_running());
        assert!(status.events_published() >= 1);
        assert!(status.last_event_at().is_some());

        cancel.cancel();
        let result = handle.await.expect("feed task should join");
        assert_eq!(result, Ok(()));
        assert!(!status.is_running());
    }

    #[tokio::test]
    async fn sampled_event_carries_the_users_bank() {
        // u1 watches the only stock, so every sampled event is u1's own
        // order on a watched stock: the private step targets user/u1.
        let mut directory = MockDirectory::new();
        directory.expect_users().returning(|| {
            vec![User {
                user_id: "u1".to_string(),
                user_name: "User One".to_string(),
                role: Role::Customer,
                watchlist: vec!["ACME".to_string()],
                bank_id: Some("b1".to_string()),
            }]
        });
        directory
            .expect_stock_codes()
            .returning(|| vec!["ACME".to_string()]);

        let cancel = CancellationToken::new();
        let (feed, _, registry, index) =
            feed_with(directory, Duration::from_millis(10), cancel.clone());

        let (tx, mut rx) = mpsc::channel(8);
        let session = registry.register(tx);
        index.join(session, Topic::user("u1"));

        let handle = tokio::spawn(feed.run());

        let received = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("feed should publish within the timeout")
            .expect("session channel should stay open");

        match received {
            ServerEvent::OrderUpdate(event) => {
                assert_eq!(event.user_id, "u1");
                assert_eq!(event.bank_id, "b1");
            }
            other => panic!("expected order update, got {other:?}"),
        }

        cancel.cancel();
        handle.await.expect("feed task should join").expect("feed should stop cleanly");
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let cancel = CancellationToken::new();
        let (feed, _, _, _) =
            feed_with(single_user_directory(), Duration::from_secs(60), cancel.clone());

        let handle = tokio::spawn(feed.run());
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("feed should stop promptly on cancellation")
            .expect("feed task should join");
        assert_eq!(result, Ok(()));
    }
}
