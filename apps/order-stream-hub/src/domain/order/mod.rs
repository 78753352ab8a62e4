//! Order Event Types
//!
//! Core domain types for order activity flowing through the hub. An
//! [`OrderEvent`] is the full record produced by the update source; a
//! [`PriceUpdate`] is its reduced, identity-free projection for
//! per-stock topic delivery.
//!
//! Prices serialize as strings with two fractional digits, e.g.
//! `"10.50"`, which is what downstream clients render directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Order Events
// =============================================================================

/// A single order activity record.
///
/// Fans out in full to private user topics (watchlist plus role rule)
/// and to the admin topic.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "stock_code": "ACME",
///   "market_price": "42.17",
///   "matched_price": "42.15",
///   "user_id": "u1",
///   "bank_id": "b7"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Stock the order concerns.
    pub stock_code: String,

    /// Current market price.
    pub market_price: Decimal,

    /// Price the order matched at.
    pub matched_price: Decimal,

    /// User who acted the order.
    pub user_id: String,

    /// Bank the order was acted through; empty when the acting user has
    /// no bank.
    #[serde(default)]
    pub bank_id: String,
}

// =============================================================================
// Price Updates
// =============================================================================

/// Reduced projection of an [`OrderEvent`] for per-stock topics.
///
/// Carries no acting identity, so stock subscribers learn prices without
/// learning who traded.
///
/// # Wire Format (JSON)
/// ```json
/// {"stock_code": "ACME", "market_price": "42.17", "matched_price": "42.15"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Stock the update concerns.
    pub stock_code: String,

    /// Current market price.
    pub market_price: Decimal,

    /// Price the order matched at.
    pub matched_price: Decimal,
}

impl From<&OrderEvent> for PriceUpdate {
    fn from(event: &OrderEvent) -> Self {
        Self {
            stock_code: event.stock_code.clone(),
            market_price: event.market_price,
            matched_price: event.matched_price,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OrderEvent {
        OrderEvent {
            stock_code: "ACME".to_string(),
            market_price: Decimal::new(4217, 2),
            matched_price: Decimal::new(4215, 2),
            user_id: "u1".to_string(),
            bank_id: "b7".to_string(),
        }
    }

    #[test]
    fn order_event_serializes_prices_as_strings() {
        let json = serde_json::to_value(sample_event()).unwrap();

        assert_eq!(json["market_price"], "42.17");
        assert_eq!(json["matched_price"], "42.15");
        assert_eq!(json["user_id"], "u1");
    }

    #[test]
    fn price_update_drops_acting_identity() {
        let event = sample_event();
        let update = PriceUpdate::from(&event);

        let json = serde_json::to_value(update).unwrap();
        let fields: Vec<_> = json.as_object().unwrap().keys().cloned().collect();

        assert!(fields.contains(&"stock_code".to_string()));
        assert!(!fields.contains(&"user_id".to_string()));
        assert!(!fields.contains(&"bank_id".to_string()));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn order_event_missing_bank_id_defaults_to_empty() {
        let json = r#"{
            "stock_code": "ACME",
            "market_price": "1.00",
            "matched_price": "1.01",
            "user_id": "u1"
        }"#;

        let event: OrderEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.bank_id, "");
    }
}
