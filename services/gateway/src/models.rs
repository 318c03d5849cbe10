//! HTTP DTOs. Prices and quantities cross the wire as decimal strings and
//! are converted to scaled integers at this boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PlaceOrderDto {
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub quantity: String,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub quantity: String,
    pub status: String,
    pub created_at: i64,
    pub trades: Vec<TradeDto>,
}

#[derive(Debug, Serialize)]
pub struct TradeDto {
    pub trade_id: String,
    pub price: String,
    pub quantity: String,
    /// Side of this order in the trade.
    pub side: String,
    pub occurred_at: i64,
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    pub order_id: String,
    pub status: String,
    pub remaining_qty: String,
    pub filled_qty: String,
}

#[derive(Debug, Serialize)]
pub struct QueryOrderResponse {
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    pub price: String,
    pub quantity: String,
    pub remaining_qty: String,
    pub filled_qty: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderScopeQuery {
    pub account_id: String,
    pub symbol: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub asset: String,
    pub available: String,
    pub frozen: String,
}

#[derive(Debug, Serialize)]
pub struct OrderViewDto {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub quantity: String,
    pub remaining_qty: String,
    pub filled_qty: String,
    pub status: String,
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct TradeViewDto {
    pub trade_id: String,
    pub symbol: String,
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub price: String,
    pub quantity: String,
    pub occurred_at: i64,
    pub sequence: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub from_sequence: Option<i64>,
}
