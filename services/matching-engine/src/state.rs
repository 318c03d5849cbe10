//! Lossless book state export/import for snapshotting.
//!
//! The exported state is self-contained: active orders in deterministic
//! (price, then arrival) order, closed-order statuses, and both sequence
//! counters. Importing the state into a fresh book reproduces the original
//! byte for byte, including FIFO priority within each price level.

use crate::book::order_book::{BookError, Order, OrderBook};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use types::order::OrderStatus;

/// Serialized form of an [`OrderBook`].
///
/// `orders` is sorted bids-first (best to worst), then asks (best to worst),
/// FIFO within each level, so re-adding them in vector order rebuilds every
/// queue in arrival order. `BTreeMap` keeps the closed-order serialization
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookState {
    pub symbol: String,
    pub event_seq: i64,
    pub trade_seq: i64,
    pub orders: Vec<Order>,
    pub closed_orders: BTreeMap<String, OrderStatus>,
}

impl OrderBook {
    /// Export the complete book state.
    pub fn export_state(&self) -> OrderBookState {
        let mut orders = Vec::with_capacity(self.orders().len());
        // Bids from best (highest) to worst, asks from best (lowest) to worst.
        for (_, level) in self.bids().iter().rev() {
            for order_id in level.iter() {
                if let Some(order) = self.orders().get(order_id) {
                    orders.push(order.clone());
                }
            }
        }
        for (_, level) in self.asks().iter() {
            for order_id in level.iter() {
                if let Some(order) = self.orders().get(order_id) {
                    orders.push(order.clone());
                }
            }
        }

        OrderBookState {
            symbol: self.symbol().to_string(),
            event_seq: self.event_seq(),
            trade_seq: self.trade_seq(),
            orders,
            closed_orders: self
                .closed_orders()
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Replace this book's state with an exported one.
    ///
    /// The state's symbol must match the book's (an empty symbol, as written
    /// by older snapshots, is adopted).
    pub fn import_state(&mut self, state: &OrderBookState) -> Result<(), BookError> {
        if !state.symbol.is_empty() && state.symbol != self.symbol() {
            return Err(BookError::InvalidState(format!(
                "state belongs to symbol {}, book is {}",
                state.symbol,
                self.symbol()
            )));
        }
        let closed: HashMap<String, OrderStatus> = state
            .closed_orders
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        self.restore(
            state.orders.clone(),
            closed,
            state.event_seq,
            state.trade_seq,
        )
    }
}
