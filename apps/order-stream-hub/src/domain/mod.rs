//! Domain Layer - Core directory, topic, and membership logic.
//!
//! This layer contains the core types for order update distribution
//! with no external dependencies. All types here are pure Rust with
//! serialization support.

/// Directory records: users, roles, and the order visibility rule.
pub mod directory;

/// Topic membership tracking for connected sessions.
pub mod membership;

/// Order event and reduced price update types.
pub mod order;

/// Delivery topics and their canonical text form.
pub mod topic;
