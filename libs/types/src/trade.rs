//! Trade execution types.

use crate::order::Side;
use serde::{Deserialize, Serialize};

/// A trade between a resting maker order and an incoming taker order.
///
/// The execution price is always the maker's resting price. Account ids for
/// both parties are carried so settlement can run on the command path
/// without consulting the book again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub maker_account_id: String,
    pub taker_account_id: String,
    /// Execution price in scaled units (maker's price).
    pub price: i64,
    /// Executed quantity in scaled units.
    pub quantity: i64,
    pub maker_side: Side,
    pub taker_side: Side,
    /// Unix nanos, observational.
    pub occurred_at: i64,
}
