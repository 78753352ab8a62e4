//! Application Layer - Session services and port definitions.
//!
//! This layer contains the transport-independent services that implement
//! the hub's observable behavior (login, subscriptions, broadcast
//! fan-out) and the port interfaces that infrastructure adapters plug
//! into.

/// Port interfaces for external systems (directory, update source).
pub mod ports;

/// Client wire protocol messages.
pub mod protocol;

/// Session, authentication, subscription, and broadcast services.
pub mod services;
