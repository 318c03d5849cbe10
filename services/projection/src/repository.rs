//! Read model storage contracts.

use crate::views::{OrderView, TradeView};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("trade not found: {0}")]
    TradeNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("sequence regression: symbol={symbol} current={current} new={new}")]
    SequenceRegression {
        symbol: String,
        current: i64,
        new: i64,
    },

    #[error("sequence gap detected: symbol={symbol} last={last} event={event}")]
    SequenceGap {
        symbol: String,
        last: i64,
        event: i64,
    },

    #[error("projection sequence mismatch: symbol={symbol} order_last={order_last} trade_last={trade_last}")]
    SequenceMismatch {
        symbol: String,
        order_last: i64,
        trade_last: i64,
    },

    #[error("trade conflict: trade_id={0}")]
    TradeConflict(String),

    #[error("invalid match result: {0}")]
    InvalidMatch(String),
}

/// Order view storage.
pub trait OrderRepository: Send + Sync {
    /// Create or update an order view.
    fn save(&self, order: &OrderView) -> Result<(), ProjectionError>;

    fn get_by_id(&self, order_id: &str) -> Result<OrderView, ProjectionError>;

    fn get_by_client_order_id(
        &self,
        account_id: &str,
        client_order_id: &str,
    ) -> Result<OrderView, ProjectionError>;

    fn list_by_account(&self, account_id: &str, limit: usize)
        -> Result<Vec<OrderView>, ProjectionError>;

    fn list_by_symbol(&self, symbol: &str, limit: usize) -> Result<Vec<OrderView>, ProjectionError>;

    /// Last applied sequence for a symbol (0 if none).
    fn last_sequence(&self, symbol: &str) -> Result<i64, ProjectionError>;

    /// Advance the cursor; moving it backwards is a regression error.
    fn set_last_sequence(&self, symbol: &str, sequence: i64) -> Result<(), ProjectionError>;
}

/// Trade view storage.
pub trait TradeRepository: Send + Sync {
    /// Insert a trade view; re-inserting an identical trade is a no-op,
    /// inserting a different trade under the same id is a conflict.
    fn save(&self, trade: &TradeView) -> Result<(), ProjectionError>;

    fn get_by_id(&self, trade_id: &str) -> Result<TradeView, ProjectionError>;

    /// Trades for a symbol; `from_sequence > 0` filters to `sequence >=
    /// from_sequence`.
    fn list_by_symbol(
        &self,
        symbol: &str,
        from_sequence: i64,
        limit: usize,
    ) -> Result<Vec<TradeView>, ProjectionError>;

    fn list_by_order(&self, order_id: &str, limit: usize)
        -> Result<Vec<TradeView>, ProjectionError>;

    fn last_sequence(&self, symbol: &str) -> Result<i64, ProjectionError>;

    fn set_last_sequence(&self, symbol: &str, sequence: i64) -> Result<(), ProjectionError>;
}
