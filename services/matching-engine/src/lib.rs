//! Order matching for one symbol at a time.
//!
//! Implements a price-time priority limit order book: accept, match, cancel,
//! query. Every mutation emits domain events carrying a dense, 1-based,
//! per-symbol sequence number.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced (best price first, FIFO within a
//!   price level)
//! - Deterministic matching (same inputs → same outputs)
//! - Dense event sequences: `{1, …, n}` with no gaps or repeats
//! - `filled + remaining = quantity` for every order

pub mod book;
pub mod events;
pub mod state;

pub use book::order_book::{
    BookError, CommandResult, DepthSnapshot, OrderBook, OrderSnapshot, OrderStatusChange,
};
pub use events::Event;
pub use state::OrderBookState;
