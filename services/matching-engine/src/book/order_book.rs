//! Price-time priority order book for a single symbol.
//!
//! All validation happens before any mutation: every error return leaves the
//! book untouched. Matching consumes the best opposite level first and FIFO
//! within a level; the execution price is always the maker's resting price.

use crate::book::price_level::PriceLevel;
use crate::events::{Event, OrderAccepted, OrderCanceled, OrderMatched};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use types::ids;
use types::now_nanos;
use types::order::{
    CancelOrderRequest, CancelReason, OrderStatus, PlaceOrderRequest, RequestError, Side,
};
use types::trade::Trade;

/// Rejections produced by book operations. None of them mutate state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("symbol mismatch: request {request}, orderbook {book}")]
    SymbolMismatch { request: String, book: String },

    #[error("duplicate order_id: {0}")]
    DuplicateOrderId(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order already filled")]
    AlreadyFilled,

    #[error("order already canceled")]
    AlreadyCanceled,

    #[error("unauthorized: order belongs to a different account")]
    Unauthorized,

    #[error("invalid book state: {0}")]
    InvalidState(String),
}

/// A single order's transition observed while executing one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub order_id: String,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub remaining_qty: i64,
    pub filled_qty: i64,
}

/// Everything one place/cancel command produced, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status_changes: Vec<OrderStatusChange>,
    pub trades: Vec<Trade>,
    pub events: Vec<Event>,
}

/// Aggregated market depth, best price first on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: String,
    /// (price, volume) pairs, highest bid first.
    pub bids: Vec<(i64, i64)>,
    /// (price, volume) pairs, lowest ask first.
    pub asks: Vec<(i64, i64)>,
}

/// Point-in-time view of one order.
///
/// Closed orders keep only their terminal status, so their snapshot carries
/// empty identity fields and zero quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: Option<Side>,
    pub price: i64,
    pub quantity: i64,
    pub remaining_qty: i64,
    pub filled_qty: i64,
    pub status: OrderStatus,
    pub created_at: i64,
}

/// An order resting on (or passing through) the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: i64,
    pub quantity: i64,
    pub remaining_qty: i64,
    pub status: OrderStatus,
    pub created_at: i64,
}

impl Order {
    pub fn filled_qty(&self) -> i64 {
        self.quantity - self.remaining_qty
    }
}

/// The order book for one symbol.
pub struct OrderBook {
    symbol: String,
    /// Buy levels, best bid = highest key.
    bids: BTreeMap<i64, PriceLevel>,
    /// Sell levels, best ask = lowest key.
    asks: BTreeMap<i64, PriceLevel>,
    /// Active orders by id.
    orders: HashMap<String, Order>,
    /// Terminal status per closed order id, for duplicate-id rejection.
    closed_orders: HashMap<String, OrderStatus>,
    event_seq: i64,
    trade_seq: i64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
            closed_orders: HashMap::new(),
            event_seq: 0,
            trade_seq: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sequence of the most recently emitted event (0 if none yet).
    pub fn event_seq(&self) -> i64 {
        self.event_seq
    }

    /// Force the event sequence forward, e.g. after snapshot load or replay.
    pub fn set_event_seq(&mut self, seq: i64) {
        self.event_seq = seq;
    }

    fn next_event_seq(&mut self) -> i64 {
        self.event_seq += 1;
        self.event_seq
    }

    /// Place a limit order: validate, emit `OrderAccepted`, match against the
    /// opposite side, then rest any remainder at the limit price.
    pub fn place_limit(&mut self, req: &PlaceOrderRequest) -> Result<CommandResult, BookError> {
        req.validate()?;
        if req.symbol != self.symbol {
            return Err(BookError::SymbolMismatch {
                request: req.symbol.clone(),
                book: self.symbol.clone(),
            });
        }
        if self.orders.contains_key(&req.order_id) || self.closed_orders.contains_key(&req.order_id)
        {
            return Err(BookError::DuplicateOrderId(req.order_id.clone()));
        }

        let mut result = CommandResult::default();
        let mut taker = Order {
            order_id: req.order_id.clone(),
            client_order_id: req.client_order_id.clone(),
            account_id: req.account_id.clone(),
            symbol: req.symbol.clone(),
            side: req.side,
            price: req.price,
            quantity: req.quantity,
            remaining_qty: req.quantity,
            status: OrderStatus::New,
            created_at: now_nanos(),
        };

        let seq = self.next_event_seq();
        result.events.push(Event::OrderAccepted(OrderAccepted {
            sequence: seq,
            symbol: self.symbol.clone(),
            occurred_at: now_nanos(),
            order_id: taker.order_id.clone(),
            client_order_id: taker.client_order_id.clone(),
            account_id: taker.account_id.clone(),
            side: taker.side,
            price: taker.price,
            quantity: taker.quantity,
            status: taker.status,
        }));

        self.match_incoming(&mut taker, &mut result);

        if taker.remaining_qty > 0 {
            let levels = match taker.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            levels
                .entry(taker.price)
                .or_insert_with(|| PriceLevel::new(taker.price))
                .add(taker.order_id.clone(), taker.remaining_qty);
            self.orders.insert(taker.order_id.clone(), taker);
        } else {
            self.closed_orders
                .insert(taker.order_id.clone(), OrderStatus::Filled);
        }

        Ok(result)
    }

    /// Drive the incoming order against crossing levels until it is filled
    /// or no level crosses its limit anymore.
    fn match_incoming(&mut self, taker: &mut Order, result: &mut CommandResult) {
        while taker.remaining_qty > 0 {
            let best_price = match taker.side {
                Side::Buy => match self.asks.keys().next().copied() {
                    Some(p) if p <= taker.price => p,
                    _ => break,
                },
                Side::Sell => match self.bids.keys().next_back().copied() {
                    Some(p) if p >= taker.price => p,
                    _ => break,
                },
            };

            let maker_levels = match taker.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let Some(level) = maker_levels.get_mut(&best_price) else {
                break;
            };
            let Some(front) = level.front() else {
                maker_levels.remove(&best_price);
                continue;
            };
            let maker_id = front.to_string();

            // The queue and the order map move together; a dangling id means
            // the entry is stale and is dropped without emitting anything.
            let Some(maker) = self.orders.get_mut(&maker_id) else {
                level.pop_front();
                continue;
            };

            let match_qty = maker.remaining_qty.min(taker.remaining_qty);
            maker.remaining_qty -= match_qty;
            taker.remaining_qty -= match_qty;

            let maker_account_id = maker.account_id.clone();
            let maker_side = maker.side;
            let maker_change = apply_status(maker);
            let maker_now_filled = maker.remaining_qty == 0;

            self.trade_seq += 1;
            let trade_id = ids::trade_id(self.trade_seq);
            let occurred_at = now_nanos();
            result.trades.push(Trade {
                trade_id: trade_id.clone(),
                symbol: self.symbol.clone(),
                maker_order_id: maker_id.clone(),
                taker_order_id: taker.order_id.clone(),
                maker_account_id,
                taker_account_id: taker.account_id.clone(),
                price: best_price,
                quantity: match_qty,
                maker_side,
                taker_side: taker.side,
                occurred_at,
            });

            let seq = self.next_event_seq();
            result.events.push(Event::OrderMatched(OrderMatched {
                sequence: seq,
                symbol: self.symbol.clone(),
                occurred_at,
                trade_id,
                maker_order_id: maker_id.clone(),
                taker_order_id: taker.order_id.clone(),
                price: best_price,
                quantity: match_qty,
                maker_side,
                taker_side: taker.side,
            }));

            if let Some(change) = maker_change {
                result.status_changes.push(change);
            }
            if let Some(change) = apply_status(taker) {
                result.status_changes.push(change);
            }

            let maker_levels = match taker.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            if let Some(level) = maker_levels.get_mut(&best_price) {
                level.reduce_volume(match_qty);
                if maker_now_filled {
                    level.pop_front();
                    if level.is_empty() {
                        maker_levels.remove(&best_price);
                    }
                }
            }
            if maker_now_filled {
                self.orders.remove(&maker_id);
                self.closed_orders.insert(maker_id, OrderStatus::Filled);
            }
        }
    }

    /// Cancel an active order on behalf of its owning account.
    pub fn cancel(&mut self, req: &CancelOrderRequest) -> Result<CommandResult, BookError> {
        self.cancel_with_reason(req, CancelReason::User)
    }

    /// Cancel with an explicit reason (`System` / `Expired` for internal
    /// callers).
    pub fn cancel_with_reason(
        &mut self,
        req: &CancelOrderRequest,
        canceled_by: CancelReason,
    ) -> Result<CommandResult, BookError> {
        req.validate()?;
        if req.symbol != self.symbol {
            return Err(BookError::SymbolMismatch {
                request: req.symbol.clone(),
                book: self.symbol.clone(),
            });
        }
        if let Some(status) = self.closed_orders.get(&req.order_id) {
            return Err(match status {
                OrderStatus::Filled => BookError::AlreadyFilled,
                OrderStatus::Canceled => BookError::AlreadyCanceled,
                _ => BookError::OrderNotFound(req.order_id.clone()),
            });
        }
        let Some(order) = self.orders.get(&req.order_id) else {
            return Err(BookError::OrderNotFound(req.order_id.clone()));
        };
        if order.account_id != req.account_id {
            return Err(BookError::Unauthorized);
        }

        let order = match self.orders.remove(&req.order_id) {
            Some(o) => o,
            None => return Err(BookError::OrderNotFound(req.order_id.clone())),
        };

        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = levels.get_mut(&order.price) {
            level.remove(&order.order_id, order.remaining_qty);
            if level.is_empty() {
                levels.remove(&order.price);
            }
        }

        let mut result = CommandResult::default();
        result.status_changes.push(OrderStatusChange {
            order_id: order.order_id.clone(),
            old_status: order.status,
            new_status: OrderStatus::Canceled,
            remaining_qty: order.remaining_qty,
            filled_qty: order.filled_qty(),
        });

        let seq = self.next_event_seq();
        result.events.push(Event::OrderCanceled(OrderCanceled {
            sequence: seq,
            symbol: self.symbol.clone(),
            occurred_at: now_nanos(),
            order_id: order.order_id.clone(),
            account_id: order.account_id.clone(),
            remaining_qty: order.remaining_qty,
            canceled_by,
        }));

        self.closed_orders
            .insert(order.order_id, OrderStatus::Canceled);

        Ok(result)
    }

    /// Snapshot one order's current state.
    ///
    /// Active orders return the full snapshot; closed orders return a
    /// minimal `{order_id, symbol, status, remaining_qty = 0}` view.
    pub fn order_snapshot(&self, order_id: &str) -> Result<OrderSnapshot, BookError> {
        if let Some(order) = self.orders.get(order_id) {
            return Ok(OrderSnapshot {
                order_id: order.order_id.clone(),
                client_order_id: order.client_order_id.clone(),
                account_id: order.account_id.clone(),
                symbol: order.symbol.clone(),
                side: Some(order.side),
                price: order.price,
                quantity: order.quantity,
                remaining_qty: order.remaining_qty,
                filled_qty: order.filled_qty(),
                status: order.status,
                created_at: order.created_at,
            });
        }
        if let Some(status) = self.closed_orders.get(order_id) {
            return Ok(OrderSnapshot {
                order_id: order_id.to_string(),
                client_order_id: String::new(),
                account_id: String::new(),
                symbol: self.symbol.clone(),
                side: None,
                price: 0,
                quantity: 0,
                remaining_qty: 0,
                filled_qty: 0,
                status: *status,
                created_at: 0,
            });
        }
        Err(BookError::OrderNotFound(order_id.to_string()))
    }

    /// Aggregated depth: up to `levels` (price, volume) pairs per side,
    /// best price first.
    pub fn depth(&self, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            symbol: self.symbol.clone(),
            bids: self
                .bids
                .iter()
                .rev()
                .take(levels)
                .map(|(price, level)| (*price, level.volume()))
                .collect(),
            asks: self
                .asks
                .iter()
                .take(levels)
                .map(|(price, level)| (*price, level.volume()))
                .collect(),
        }
    }

    // Accessors used by state export and tests.

    pub(crate) fn bids(&self) -> &BTreeMap<i64, PriceLevel> {
        &self.bids
    }

    pub(crate) fn asks(&self) -> &BTreeMap<i64, PriceLevel> {
        &self.asks
    }

    pub(crate) fn orders(&self) -> &HashMap<String, Order> {
        &self.orders
    }

    pub(crate) fn closed_orders(&self) -> &HashMap<String, OrderStatus> {
        &self.closed_orders
    }

    pub(crate) fn trade_seq(&self) -> i64 {
        self.trade_seq
    }

    pub(crate) fn restore(
        &mut self,
        orders: Vec<Order>,
        closed_orders: HashMap<String, OrderStatus>,
        event_seq: i64,
        trade_seq: i64,
    ) -> Result<(), BookError> {
        self.bids.clear();
        self.asks.clear();
        self.orders.clear();
        self.closed_orders = closed_orders;
        self.event_seq = event_seq;
        self.trade_seq = trade_seq;

        for order in orders {
            if order.symbol != self.symbol {
                return Err(BookError::InvalidState(format!(
                    "order {} belongs to symbol {}, book is {}",
                    order.order_id, order.symbol, self.symbol
                )));
            }
            if order.remaining_qty <= 0 || order.remaining_qty > order.quantity {
                return Err(BookError::InvalidState(format!(
                    "order {} has invalid remaining quantity {}",
                    order.order_id, order.remaining_qty
                )));
            }
            let levels = match order.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            levels
                .entry(order.price)
                .or_insert_with(|| PriceLevel::new(order.price))
                .add(order.order_id.clone(), order.remaining_qty);
            self.orders.insert(order.order_id.clone(), order);
        }
        Ok(())
    }
}

/// Recompute an order's status from its remaining quantity, recording a
/// change entry when the status actually moved.
fn apply_status(order: &mut Order) -> Option<OrderStatusChange> {
    let new_status = if order.remaining_qty == 0 {
        OrderStatus::Filled
    } else if order.remaining_qty < order.quantity {
        OrderStatus::PartiallyFilled
    } else {
        OrderStatus::New
    };
    if new_status == order.status {
        return None;
    }
    let old_status = order.status;
    order.status = new_status;
    Some(OrderStatusChange {
        order_id: order.order_id.clone(),
        old_status,
        new_status,
        remaining_qty: order.remaining_qty,
        filled_qty: order.quantity - order.remaining_qty,
    })
}
