//! WebSocket Gateway
//!
//! Accepts client WebSocket connections and speaks the JSON wire
//! protocol over them.
//!
//! # Session Lifecycle
//!
//! Each accepted connection becomes one session:
//!
//! 1. Registers the session and its bounded outbound queue
//! 2. Pumps queued server events onto the socket as JSON text frames
//! 3. Parses inbound frames and dispatches them to the auth and
//!    subscription services, answering on the same session
//! 4. On disconnect, tears the session down synchronously: topic
//!    memberships first, then the registry entry

pub mod server;

pub use server::{GatewayError, GatewayServer};
