//! Order lifecycle types and command requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Parse an UPPERCASE side string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order status.
///
/// `Filled` and `Canceled` are terminal; a terminal status is observed
/// exactly once per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who initiated a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancelReason {
    User,
    System,
    Expired,
}

/// Validation failure for a command request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0} required")]
    MissingField(&'static str),

    #[error("invalid side")]
    InvalidSide,

    #[error("price must be positive")]
    NonPositivePrice,

    #[error("quantity must be positive")]
    NonPositiveQuantity,
}

/// Internal place-order request (converted by the gateway edge).
///
/// Prices and quantities are already scaled integers here; decimal-string
/// parsing happens at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    /// Server-assigned order id (deterministic from the idempotency key).
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
}

impl PlaceOrderRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.order_id.is_empty() {
            return Err(RequestError::MissingField("order_id"));
        }
        if self.client_order_id.is_empty() {
            return Err(RequestError::MissingField("client_order_id"));
        }
        if self.account_id.is_empty() {
            return Err(RequestError::MissingField("account_id"));
        }
        if self.symbol.is_empty() {
            return Err(RequestError::MissingField("symbol"));
        }
        if self.price <= 0 {
            return Err(RequestError::NonPositivePrice);
        }
        if self.quantity <= 0 {
            return Err(RequestError::NonPositiveQuantity);
        }
        Ok(())
    }
}

/// Cancel-order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: String,
    /// Account id, checked against the order's owner.
    pub account_id: String,
    pub symbol: String,
}

impl CancelOrderRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.order_id.is_empty() {
            return Err(RequestError::MissingField("order_id"));
        }
        if self.account_id.is_empty() {
            return Err(RequestError::MissingField("account_id"));
        }
        if self.symbol.is_empty() {
            return Err(RequestError::MissingField("symbol"));
        }
        Ok(())
    }
}

/// Query-order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOrderRequest {
    pub order_id: String,
    pub account_id: String,
    pub symbol: String,
}

impl QueryOrderRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.order_id.is_empty() {
            return Err(RequestError::MissingField("order_id"));
        }
        if self.account_id.is_empty() {
            return Err(RequestError::MissingField("account_id"));
        }
        if self.symbol.is_empty() {
            return Err(RequestError::MissingField("symbol"));
        }
        Ok(())
    }
}
