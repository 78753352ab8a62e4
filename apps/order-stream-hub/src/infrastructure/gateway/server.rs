//! WebSocket Gateway Server Implementation
//!
//! Owns the TCP accept loop and the per-connection protocol tasks.
//! Request handling maps service errors to the short client-facing
//! reason strings; richer diagnostics stay in the logs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::protocol::{ClientRequest, ServerEvent};
use crate::application::services::{
    AuthError, AuthService, SessionRegistry, SubError, SubscriptionService,
};
use crate::domain::membership::{MembershipIndex, SessionId};
use crate::infrastructure::metrics::{
    SubscriptionAction, record_login, record_messages_dropped, record_subscription,
    set_sessions_authenticated, set_sessions_connected, set_topics,
};

// =============================================================================
// Shared Handles
// =============================================================================

/// Everything a connection task needs, shared across all sessions.
struct Services {
    auth: Arc<AuthService>,
    subscriptions: Arc<SubscriptionService>,
    registry: Arc<SessionRegistry>,
    index: Arc<MembershipIndex>,
    queue_capacity: usize,
}

impl Services {
    /// Parse one text frame and dispatch it.
    ///
    /// Malformed frames are logged and ignored; the session stays
    /// connected.
    fn handle_request(&self, session: SessionId, text: &str) {
        let request = match serde_json::from_str::<ClientRequest>(text) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(
                    session = %session,
                    error = %error,
                    "Ignoring malformed frame"
                );
                return;
            }
        };

        match request {
            ClientRequest::Login { user_id } => self.handle_login(session, &user_id),
            ClientRequest::Subscribe { stock_code } => self.handle_subscribe(session, stock_code),
            ClientRequest::Unsubscribe { stock_code } => {
                self.handle_unsubscribe(session, stock_code);
            }
        }

        self.update_gauges();
    }

    fn handle_login(&self, session: SessionId, user_id: &str) {
        match self.auth.login(session, user_id) {
            Ok(outcome) => {
                record_login("success");
                self.reply(session, &ServerEvent::LoginSuccess { user: outcome.user });
            }
            Err(AuthError::UserNotFound) => {
                record_login("user_not_found");
                self.reply(
                    session,
                    &ServerEvent::LoginFailed {
                        reason: "User not found".to_string(),
                    },
                );
            }
            Err(AuthError::AlreadyAuthenticated) => {
                record_login("already_authenticated");
                self.reply(
                    session,
                    &ServerEvent::LoginFailed {
                        reason: "Already authenticated".to_string(),
                    },
                );
            }
            Err(AuthError::SessionClosed) => {
                // Nobody left to answer
                record_login("session_closed");
                tracing::debug!(session = %session, "Login raced a disconnect");
            }
        }
    }

    fn handle_subscribe(&self, session: SessionId, stock_code: String) {
        match self.subscriptions.subscribe(session, &stock_code) {
            Ok(()) => {
                record_subscription(SubscriptionAction::Subscribe, "success");
                self.reply(session, &ServerEvent::SubscribeSuccess { stock_code });
            }
            Err(SubError::NotAuthenticated) => {
                record_subscription(SubscriptionAction::Subscribe, "not_authenticated");
                self.reply(
                    session,
                    &ServerEvent::SubscribeFailed {
                        reason: "Not authenticated".to_string(),
                    },
                );
            }
            Err(SubError::InvalidStockCode) => {
                record_subscription(SubscriptionAction::Subscribe, "invalid_stock_code");
                self.reply(
                    session,
                    &ServerEvent::SubscribeFailed {
                        reason: "Invalid stock code".to_string(),
                    },
                );
            }
        }
    }

    fn handle_unsubscribe(&self, session: SessionId, stock_code: String) {
        self.subscriptions.unsubscribe(session, &stock_code);
        record_subscription(SubscriptionAction::Unsubscribe, "success");
        self.reply(session, &ServerEvent::UnsubscribeSuccess { stock_code });
    }

    /// Answer the requesting session; a dropped reply is counted, never
    /// fatal.
    fn reply(&self, session: SessionId, event: &ServerEvent) {
        let outcome = self.registry.deliver(session, event);
        if !outcome.is_delivered() {
            record_messages_dropped(1);
            tracing::debug!(
                session = %session,
                event = event.label(),
                outcome = outcome.label(),
                "Reply dropped"
            );
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_gauges(&self) {
        let sessions = self.registry.stats();
        set_sessions_connected(sessions.connected as f64);
        set_sessions_authenticated(sessions.authenticated as f64);
        set_topics(self.index.stats().topic_count as f64);
    }
}

// =============================================================================
// Gateway Server
// =============================================================================

/// WebSocket gateway accepting client sessions.
pub struct GatewayServer {
    port: u16,
    services: Arc<Services>,
    listening: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl GatewayServer {
    /// Create a new gateway server.
    #[must_use]
    pub fn new(
        port: u16,
        queue_capacity: usize,
        auth: Arc<AuthService>,
        subscriptions: Arc<SubscriptionService>,
        registry: Arc<SessionRegistry>,
        index: Arc<MembershipIndex>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            services: Arc::new(Services {
                auth,
                subscriptions,
                registry,
                index,
                queue_capacity,
            }),
            listening: Arc::new(AtomicBool::new(false)),
            cancel,
        }
    }

    /// Flag that flips to `true` while the accept loop is bound, for
    /// readiness probes.
    #[must_use]
    pub fn listening_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.listening)
    }

    /// Bind the configured port and run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if binding fails.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::BindFailed(self.port, e.to_string()))?;

        self.serve(listener).await
    }

    /// Run the accept loop on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the listener's address cannot be read.
    pub async fn serve(self, listener: TcpListener) -> Result<(), GatewayError> {
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::BindFailed(self.port, e.to_string()))?;

        self.listening.store(true, Ordering::SeqCst);
        tracing::info!(addr = %addr, "Gateway listening");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Gateway cancelled");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let services = Arc::clone(&self.services);
                            let cancel = self.cancel.clone();
                            tokio::spawn(handle_connection(services, stream, peer, cancel));
                        }
                        Err(error) => {
                            tracing::warn!(error = %error, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.listening.store(false, Ordering::SeqCst);
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

// =============================================================================
// Connection Handling
// =============================================================================

/// Run one client connection from handshake to teardown.
async fn handle_connection(
    services: Arc<Services>,
    stream: TcpStream,
    peer: SocketAddr,
    cancel: CancellationToken,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(error) => {
            tracing::debug!(peer = %peer, error = %error, "WebSocket handshake failed");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let (tx, rx) = mpsc::channel(services.queue_capacity);
    let session = services.registry.register(tx);
    services.update_gauges();

    tracing::info!(session = %session, peer = %peer, "Session connected");

    // Outbound pump: the registry queue is the only writer of this socket
    let mut outbound = ReceiverStream::new(rx);
    tokio::spawn(async move {
        while let Some(event) = outbound.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    tracing::error!(
                        error = %error,
                        event = event.label(),
                        "Failed to encode server event"
                    );
                    continue;
                }
            };
            if write.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(session = %session, "Gateway shutting down, closing session");
                break;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        services.handle_request(session, &text);
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!(session = %session, "Client sent close frame");
                        break;
                    }
                    // tungstenite answers pings itself
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(session = %session, error = %error, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Memberships go first: once they are gone no fan-out targets this
    // session, then the registry entry drops the queue sender and the
    // outbound pump drains out.
    let topics_left = services.index.leave_all(session).len();
    services.registry.unregister(session);
    services.update_gauges();

    tracing::info!(
        session = %session,
        peer = %peer,
        topics = topics_left,
        "Session disconnected"
    );
}

// =============================================================================
// Errors
// =============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::application::ports::{Directory, MockDirectory};
    use crate::domain::directory::{Role, User};
    use crate::domain::topic::Topic;

    use super::*;

    fn directory_with(users: &'static [&'static str], stocks: &'static [&'static str]) -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory.expect_find_user().returning(move |id| {
            users.contains(&id).then(|| User {
                user_id: id.to_string(),
                user_name: format!("User {id}"),
                role: Role::Customer,
                watchlist: vec![],
                bank_id: None,
            })
        });
        directory
            .expect_is_valid_stock()
            .returning(move |code| stocks.contains(&code));
        directory
    }

    fn services_with(directory: MockDirectory) -> Arc<Services> {
        let directory: Arc<dyn Directory> = Arc::new(directory);
        let registry = Arc::new(SessionRegistry::new());
        let index = Arc::new(MembershipIndex::new());
        let auth = Arc::new(AuthService::new(
            Arc::clone(&directory),
            Arc::clone(&registry),
            Arc::clone(&index),
        ));
        let subscriptions = Arc::new(SubscriptionService::new(
            directory,
            Arc::clone(&registry),
            Arc::clone(&index),
        ));
        Arc::new(Services {
            auth,
            subscriptions,
            registry,
            index,
            queue_capacity: 8,
        })
    }

    fn connect(services: &Services) -> (SessionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let session = services.registry.register(tx);
        (session, rx)
    }

    #[tokio::test]
    async fn login_replies_with_full_user() {
        let services = services_with(directory_with(&["u1"], &[]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"login","user_id":"u1"}"#);

        match rx.try_recv().unwrap() {
            ServerEvent::LoginSuccess { user } => assert_eq!(user.user_id, "u1"),
            other => panic!("expected login success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_user_gets_the_original_reason_string() {
        let services = services_with(directory_with(&[], &[]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"login","user_id":"ghost"}"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::LoginFailed {
                reason: "User not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn second_login_is_rejected() {
        let services = services_with(directory_with(&["u1", "u2"], &[]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"login","user_id":"u1"}"#);
        services.handle_request(session, r#"{"type":"login","user_id":"u2"}"#);

        let _first = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::LoginFailed {
                reason: "Already authenticated".to_string()
            }
        );
    }

    #[tokio::test]
    async fn subscribe_before_login_fails() {
        let services = services_with(directory_with(&[], &["ACME"]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"subscribe","stock_code":"ACME"}"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::SubscribeFailed {
                reason: "Not authenticated".to_string()
            }
        );
    }

    #[tokio::test]
    async fn subscribe_unknown_stock_fails() {
        let services = services_with(directory_with(&["u1"], &["ACME"]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"login","user_id":"u1"}"#);
        services.handle_request(session, r#"{"type":"subscribe","stock_code":"FAKE"}"#);

        let _login = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::SubscribeFailed {
                reason: "Invalid stock code".to_string()
            }
        );
    }

    #[tokio::test]
    async fn subscribe_joins_the_stock_topic() {
        let services = services_with(directory_with(&["u1"], &["ACME"]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"login","user_id":"u1"}"#);
        services.handle_request(session, r#"{"type":"subscribe","stock_code":"ACME"}"#);

        let _login = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::SubscribeSuccess {
                stock_code: "ACME".to_string()
            }
        );
        assert!(services.index.is_member(session, &Topic::stock("ACME")));
    }

    #[tokio::test]
    async fn unsubscribe_succeeds_even_before_login() {
        let services = services_with(directory_with(&[], &[]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, r#"{"type":"unsubscribe","stock_code":"ACME"}"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::UnsubscribeSuccess {
                stock_code: "ACME".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let services = services_with(directory_with(&[], &[]));
        let (session, mut rx) = connect(&services);

        services.handle_request(session, "not json at all");
        services.handle_request(session, r#"{"type":"reboot"}"#);
        services.handle_request(session, r#"{"type":"login"}"#);

        assert!(rx.try_recv().is_err(), "no reply expected for garbage frames");
    }
}
