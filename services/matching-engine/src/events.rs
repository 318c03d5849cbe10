//! Domain events emitted by the order book.
//!
//! The event type is a closed sum of three cases so the projector and the
//! log codec can match exhaustively. Each event carries the per-symbol
//! sequence number assigned at emission time.

use serde::{Deserialize, Serialize};
use types::order::{CancelReason, OrderStatus, Side};

/// An order was accepted onto the book.
///
/// Carries the full `(account_id, side, price, quantity)` tuple: ledger
/// recovery derives freezes and trade parties from accepted events alone,
/// so this field set must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub sequence: i64,
    pub symbol: String,
    /// Unix nanos, observational.
    pub occurred_at: i64,
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
    pub status: OrderStatus,
}

/// A trade was executed between a resting maker and an incoming taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMatched {
    pub sequence: i64,
    pub symbol: String,
    pub occurred_at: i64,
    pub trade_id: String,
    pub maker_order_id: String,
    pub taker_order_id: String,
    /// Execution price (the maker's resting price).
    pub price: i64,
    pub quantity: i64,
    pub maker_side: Side,
    pub taker_side: Side,
}

/// An order was canceled with quantity still remaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub sequence: i64,
    pub symbol: String,
    pub occurred_at: i64,
    pub order_id: String,
    pub account_id: String,
    pub remaining_qty: i64,
    pub canceled_by: CancelReason,
}

/// Closed sum of all domain events on a symbol's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderAccepted(OrderAccepted),
    OrderMatched(OrderMatched),
    OrderCanceled(OrderCanceled),
}

impl Event {
    pub fn sequence(&self) -> i64 {
        match self {
            Event::OrderAccepted(e) => e.sequence,
            Event::OrderMatched(e) => e.sequence,
            Event::OrderCanceled(e) => e.sequence,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Event::OrderAccepted(e) => &e.symbol,
            Event::OrderMatched(e) => &e.symbol,
            Event::OrderCanceled(e) => &e.symbol,
        }
    }

    pub fn occurred_at(&self) -> i64 {
        match self {
            Event::OrderAccepted(e) => e.occurred_at,
            Event::OrderMatched(e) => e.occurred_at,
            Event::OrderCanceled(e) => e.occurred_at,
        }
    }

    /// Event type label used by the log codec and tracing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OrderAccepted(_) => "OrderAccepted",
            Event::OrderMatched(_) => "OrderMatched",
            Event::OrderCanceled(_) => "OrderCanceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wire contracts: the serialized field set of accepted events feeds
    // ledger recovery, so names and enum spellings must stay stable.

    #[test]
    fn test_order_accepted_wire_contract() {
        let event = OrderAccepted {
            sequence: 7,
            symbol: "BTC-USDT".into(),
            occurred_at: 1_700_000_000_000_000_000,
            order_id: "ord_1".into(),
            client_order_id: "c1".into(),
            account_id: "acc-1".into(),
            side: Side::Buy,
            price: 43_000,
            quantity: 100,
            status: OrderStatus::New,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(json["sequence"], 7);
        assert_eq!(json["account_id"], "acc-1");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["price"], 43_000);
        assert_eq!(json["quantity"], 100);
        assert_eq!(json["status"], "NEW");
    }

    #[test]
    fn test_order_matched_wire_contract() {
        let event = OrderMatched {
            sequence: 8,
            symbol: "BTC-USDT".into(),
            occurred_at: 0,
            trade_id: "trd_1".into(),
            maker_order_id: "m".into(),
            taker_order_id: "t".into(),
            price: 43_000,
            quantity: 50,
            maker_side: Side::Sell,
            taker_side: Side::Buy,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(json["trade_id"], "trd_1");
        assert_eq!(json["maker_side"], "SELL");
        assert_eq!(json["taker_side"], "BUY");
    }

    #[test]
    fn test_order_canceled_wire_contract() {
        let event = OrderCanceled {
            sequence: 9,
            symbol: "BTC-USDT".into(),
            occurred_at: 0,
            order_id: "ord_1".into(),
            account_id: "acc-1".into(),
            remaining_qty: 25,
            canceled_by: CancelReason::User,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(json["remaining_qty"], 25);
        assert_eq!(json["canceled_by"], "USER");
    }

    #[test]
    fn test_event_type_labels() {
        let accepted = Event::OrderAccepted(OrderAccepted {
            sequence: 1,
            symbol: "BTC-USDT".into(),
            occurred_at: 0,
            order_id: "o".into(),
            client_order_id: "c".into(),
            account_id: "a".into(),
            side: Side::Buy,
            price: 1,
            quantity: 1,
            status: OrderStatus::New,
        });
        assert_eq!(accepted.event_type(), "OrderAccepted");
        assert_eq!(accepted.sequence(), 1);
        assert_eq!(accepted.symbol(), "BTC-USDT");
    }
}
