//! Delivery Topics
//!
//! A topic is a named delivery group. Sessions join topics at login and
//! through stock subscriptions; the broadcast engine resolves topics back
//! to member sessions at fan-out time.
//!
//! # Canonical Text Form
//!
//! | Topic          | Text form   |
//! |----------------|-------------|
//! | `User("u1")`   | `user/u1`   |
//! | `Admin`        | `admin`     |
//! | `Stock("ACME")`| `stock/ACME`|
//! | `Bank("b7")`   | `bank/b7`   |
//!
//! The text form appears in logs and the membership stats surface; it is
//! not part of the client wire protocol.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::directory::{BankId, StockCode, UserId};

// =============================================================================
// Types
// =============================================================================

/// A delivery group that sessions join and broadcasts target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Private topic of a single user (`user/<id>`).
    User(UserId),
    /// Shared topic that receives every order update (`admin`).
    Admin,
    /// Per-stock topic for reduced price updates (`stock/<code>`).
    Stock(StockCode),
    /// Per-bank topic joined by bank-role users at login (`bank/<id>`).
    Bank(BankId),
}

impl Topic {
    /// Private topic of a single user.
    #[must_use]
    pub fn user(id: impl Into<UserId>) -> Self {
        Self::User(id.into())
    }

    /// Per-stock topic.
    #[must_use]
    pub fn stock(code: impl Into<StockCode>) -> Self {
        Self::Stock(code.into())
    }

    /// Per-bank topic.
    #[must_use]
    pub fn bank(id: impl Into<BankId>) -> Self {
        Self::Bank(id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user/{id}"),
            Self::Admin => f.write_str("admin"),
            Self::Stock(code) => write!(f, "stock/{code}"),
            Self::Bank(id) => write!(f, "bank/{id}"),
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Error returned when a topic's text form cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid topic: {text}")]
pub struct TopicParseError {
    /// The text that failed to parse.
    pub text: String,
}

impl FromStr for Topic {
    type Err = TopicParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "admin" {
            return Ok(Self::Admin);
        }

        match s.split_once('/') {
            Some(("user", id)) if !id.is_empty() => Ok(Self::User(id.to_string())),
            Some(("stock", code)) if !code.is_empty() => Ok(Self::Stock(code.to_string())),
            Some(("bank", id)) if !id.is_empty() => Ok(Self::Bank(id.to_string())),
            _ => Err(TopicParseError {
                text: s.to_string(),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;

    #[test_case("user/u1", Topic::User("u1".to_string()); "user topic")]
    #[test_case("admin", Topic::Admin; "admin topic")]
    #[test_case("stock/ACME", Topic::Stock("ACME".to_string()); "stock topic")]
    #[test_case("bank/b7", Topic::Bank("b7".to_string()); "bank topic")]
    fn parse_valid_topic(text: &str, expected: Topic) {
        let topic: Topic = text.parse().unwrap();
        assert_eq!(topic, expected);
    }

    #[test_case(""; "empty string")]
    #[test_case("user/"; "user with empty id")]
    #[test_case("stock/"; "stock with empty code")]
    #[test_case("bank/"; "bank with empty id")]
    #[test_case("orders/u1"; "unknown prefix")]
    #[test_case("Admin"; "case sensitive admin")]
    fn parse_invalid_topic(text: &str) {
        let result: Result<Topic, _> = text.parse();
        assert!(result.is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let topics = [
            Topic::user("u1"),
            Topic::Admin,
            Topic::stock("ACME"),
            Topic::bank("b7"),
        ];

        for topic in topics {
            let parsed: Topic = topic.to_string().parse().unwrap();
            assert_eq!(parsed, topic);
        }
    }

    #[test]
    fn user_id_with_slash_survives_display() {
        // Ids are opaque; only the first separator is structural.
        let topic = Topic::user("desk/7");
        let parsed: Topic = topic.to_string().parse().unwrap();
        assert_eq!(parsed, topic);
    }

    #[test]
    fn topics_are_usable_as_set_keys() {
        let mut set = HashSet::new();
        set.insert(Topic::user("u1"));
        set.insert(Topic::user("u1"));
        set.insert(Topic::Admin);

        assert_eq!(set.len(), 2);
    }
}
