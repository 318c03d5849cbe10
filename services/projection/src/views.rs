//! Read model records.

use serde::{Deserialize, Serialize};
use types::order::OrderStatus;

/// Queryable state of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: String,
    pub price: i64,
    pub quantity: i64,
    pub remaining_qty: i64,
    pub filled_qty: i64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
    /// Sequence of the last event applied to this view.
    pub last_sequence: i64,
}

/// Queryable record of one trade, with both parties resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeView {
    pub trade_id: String,
    pub symbol: String,
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub maker_account_id: String,
    pub taker_account_id: String,
    pub price: i64,
    pub quantity: i64,
    pub occurred_at: i64,
    pub sequence: i64,
}
