//! Event projector for the order and trade read models.

use crate::repository::{OrderRepository, ProjectionError, TradeRepository};
use crate::views::{OrderView, TradeView};
use matching_engine::events::{Event, OrderAccepted, OrderCanceled, OrderMatched};
use std::sync::Arc;
use types::order::OrderStatus;

/// Consumes domain events in order and updates the read models.
pub struct Projector {
    order_repo: Arc<dyn OrderRepository>,
    trade_repo: Arc<dyn TradeRepository>,
}

impl Projector {
    pub fn new(order_repo: Arc<dyn OrderRepository>, trade_repo: Arc<dyn TradeRepository>) -> Self {
        Self {
            order_repo,
            trade_repo,
        }
    }

    /// Apply one event.
    ///
    /// Both cursors must agree before anything is applied, and the event's
    /// sequence must be exactly `last + 1` (first event: 1). The trade
    /// cursor advances before the order cursor: the order side is the
    /// source of truth for replay position, so it must never run ahead of
    /// the trades.
    pub fn project(&self, event: &Event) -> Result<(), ProjectionError> {
        let symbol = event.symbol();
        let sequence = event.sequence();

        self.validate_sequence(symbol, sequence)?;

        match event {
            Event::OrderAccepted(e) => self.project_order_accepted(e)?,
            Event::OrderMatched(e) => self.project_order_matched(e)?,
            Event::OrderCanceled(e) => self.project_order_canceled(e)?,
        }

        self.trade_repo.set_last_sequence(symbol, sequence)?;
        self.order_repo.set_last_sequence(symbol, sequence)?;
        Ok(())
    }

    fn validate_sequence(&self, symbol: &str, sequence: i64) -> Result<(), ProjectionError> {
        let order_last = self.order_repo.last_sequence(symbol)?;
        let trade_last = self.trade_repo.last_sequence(symbol)?;
        if order_last != trade_last {
            return Err(ProjectionError::SequenceMismatch {
                symbol: symbol.to_string(),
                order_last,
                trade_last,
            });
        }

        if order_last == 0 && sequence != 1 {
            return Err(ProjectionError::SequenceGap {
                symbol: symbol.to_string(),
                last: 0,
                event: sequence,
            });
        }
        if order_last > 0 && sequence != order_last + 1 {
            if sequence < order_last + 1 {
                return Err(ProjectionError::SequenceRegression {
                    symbol: symbol.to_string(),
                    current: order_last,
                    new: sequence,
                });
            }
            return Err(ProjectionError::SequenceGap {
                symbol: symbol.to_string(),
                last: order_last,
                event: sequence,
            });
        }
        Ok(())
    }

    fn project_order_accepted(&self, event: &OrderAccepted) -> Result<(), ProjectionError> {
        match self.order_repo.get_by_id(&event.order_id) {
            Ok(existing) => {
                // Idempotent retry.
                if existing.last_sequence >= event.sequence {
                    return Ok(());
                }
            }
            Err(ProjectionError::OrderNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        self.order_repo.save(&OrderView {
            order_id: event.order_id.clone(),
            client_order_id: event.client_order_id.clone(),
            account_id: event.account_id.clone(),
            symbol: event.symbol.clone(),
            side: event.side.as_str().to_string(),
            price: event.price,
            quantity: event.quantity,
            remaining_qty: event.quantity,
            filled_qty: 0,
            status: OrderStatus::New,
            created_at: event.occurred_at,
            updated_at: event.occurred_at,
            last_sequence: event.sequence,
        })
    }

    fn project_order_matched(&self, event: &OrderMatched) -> Result<(), ProjectionError> {
        let maker = self.order_repo.get_by_id(&event.maker_order_id)?;
        let taker = self.order_repo.get_by_id(&event.taker_order_id)?;

        let maker = apply_match(maker, event.quantity, event.occurred_at, event.sequence);
        let taker = apply_match(taker, event.quantity, event.occurred_at, event.sequence);

        for order in [&maker, &taker] {
            if order.remaining_qty < 0 {
                return Err(ProjectionError::InvalidMatch(format!(
                    "negative remaining quantity on {}",
                    order.order_id
                )));
            }
            if order.filled_qty > order.quantity {
                return Err(ProjectionError::InvalidMatch(format!(
                    "filled quantity exceeds order quantity on {}",
                    order.order_id
                )));
            }
        }

        self.order_repo.save(&maker)?;
        self.order_repo.save(&taker)?;

        self.trade_repo.save(&TradeView {
            trade_id: event.trade_id.clone(),
            symbol: event.symbol.clone(),
            maker_order_id: event.maker_order_id.clone(),
            taker_order_id: event.taker_order_id.clone(),
            maker_account_id: maker.account_id,
            taker_account_id: taker.account_id,
            price: event.price,
            quantity: event.quantity,
            occurred_at: event.occurred_at,
            sequence: event.sequence,
        })
    }

    fn project_order_canceled(&self, event: &OrderCanceled) -> Result<(), ProjectionError> {
        let mut order = self.order_repo.get_by_id(&event.order_id)?;
        if order.last_sequence >= event.sequence {
            return Ok(());
        }
        order.status = OrderStatus::Canceled;
        order.updated_at = event.occurred_at;
        order.last_sequence = event.sequence;
        self.order_repo.save(&order)
    }
}

/// Apply a fill to an order view; a view that already saw this sequence is
/// returned unchanged (idempotent retry).
fn apply_match(mut order: OrderView, match_qty: i64, at: i64, sequence: i64) -> OrderView {
    if order.last_sequence >= sequence {
        return order;
    }
    order.filled_qty += match_qty;
    order.remaining_qty -= match_qty;
    order.updated_at = at;
    order.last_sequence = sequence;
    order.status = if order.remaining_qty == 0 {
        OrderStatus::Filled
    } else {
        OrderStatus::PartiallyFilled
    };
    order
}
