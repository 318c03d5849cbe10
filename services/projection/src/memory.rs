//! In-memory read model repositories.
//!
//! Clone-on-read: callers never share a reference into the store, so a
//! later projection cannot mutate a view a reader already holds.

use crate::repository::{OrderRepository, ProjectionError, TradeRepository};
use crate::views::{OrderView, TradeView};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct OrderState {
    /// order_id → view
    orders: HashMap<String, OrderView>,
    /// account_id → client_order_id → order_id
    by_client_order_id: HashMap<String, HashMap<String, String>>,
    /// account_id → order ids in insertion order
    by_account: HashMap<String, Vec<String>>,
    /// symbol → order ids in insertion order
    by_symbol: HashMap<String, Vec<String>>,
    /// symbol → last applied sequence
    last_sequence: HashMap<String, i64>,
}

/// In-memory [`OrderRepository`].
#[derive(Default)]
pub struct MemoryOrderRepository {
    state: RwLock<OrderState>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderRepository for MemoryOrderRepository {
    fn save(&self, order: &OrderView) -> Result<(), ProjectionError> {
        if order.order_id.is_empty() {
            return Err(ProjectionError::InvalidArgument("order_id required".into()));
        }
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let is_new = !state.orders.contains_key(&order.order_id);
        if is_new {
            state
                .by_client_order_id
                .entry(order.account_id.clone())
                .or_default()
                .insert(order.client_order_id.clone(), order.order_id.clone());
            state
                .by_account
                .entry(order.account_id.clone())
                .or_default()
                .push(order.order_id.clone());
            state
                .by_symbol
                .entry(order.symbol.clone())
                .or_default()
                .push(order.order_id.clone());
        }
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    fn get_by_id(&self, order_id: &str) -> Result<OrderView, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ProjectionError::OrderNotFound(order_id.to_string()))
    }

    fn get_by_client_order_id(
        &self,
        account_id: &str,
        client_order_id: &str,
    ) -> Result<OrderView, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let order_id = state
            .by_client_order_id
            .get(account_id)
            .and_then(|index| index.get(client_order_id))
            .ok_or_else(|| ProjectionError::OrderNotFound(client_order_id.to_string()))?;
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ProjectionError::OrderNotFound(order_id.clone()))
    }

    fn list_by_account(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<OrderView>, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.by_account.get(account_id).cloned().unwrap_or_default();
        Ok(collect_views(&state.orders, &ids, limit))
    }

    fn list_by_symbol(&self, symbol: &str, limit: usize) -> Result<Vec<OrderView>, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.by_symbol.get(symbol).cloned().unwrap_or_default();
        Ok(collect_views(&state.orders, &ids, limit))
    }

    fn last_sequence(&self, symbol: &str) -> Result<i64, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.last_sequence.get(symbol).copied().unwrap_or(0))
    }

    fn set_last_sequence(&self, symbol: &str, sequence: i64) -> Result<(), ProjectionError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let current = state.last_sequence.get(symbol).copied().unwrap_or(0);
        if sequence < current {
            return Err(ProjectionError::SequenceRegression {
                symbol: symbol.to_string(),
                current,
                new: sequence,
            });
        }
        state.last_sequence.insert(symbol.to_string(), sequence);
        Ok(())
    }
}

fn collect_views(
    orders: &HashMap<String, OrderView>,
    ids: &[String],
    limit: usize,
) -> Vec<OrderView> {
    let mut views: Vec<_> = ids.iter().filter_map(|id| orders.get(id).cloned()).collect();
    if limit > 0 && views.len() > limit {
        views.truncate(limit);
    }
    views
}

#[derive(Default)]
struct TradeState {
    trades: HashMap<String, TradeView>,
    /// symbol → trade ids sorted by sequence
    by_symbol: HashMap<String, Vec<String>>,
    /// order_id → trade ids (maker and taker)
    by_order: HashMap<String, Vec<String>>,
    last_sequence: HashMap<String, i64>,
}

/// In-memory [`TradeRepository`].
#[derive(Default)]
pub struct MemoryTradeRepository {
    state: RwLock<TradeState>,
}

impl MemoryTradeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TradeRepository for MemoryTradeRepository {
    fn save(&self, trade: &TradeView) -> Result<(), ProjectionError> {
        if trade.trade_id.is_empty() {
            return Err(ProjectionError::InvalidArgument("trade_id required".into()));
        }
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let state = &mut *guard;

        if let Some(existing) = state.trades.get(&trade.trade_id) {
            if existing == trade {
                return Ok(());
            }
            return Err(ProjectionError::TradeConflict(trade.trade_id.clone()));
        }

        state.trades.insert(trade.trade_id.clone(), trade.clone());

        let symbol_index = state.by_symbol.entry(trade.symbol.clone()).or_default();
        symbol_index.push(trade.trade_id.clone());
        let trades = &state.trades;
        symbol_index.sort_by_key(|id| trades.get(id).map(|t| t.sequence).unwrap_or(0));

        state
            .by_order
            .entry(trade.maker_order_id.clone())
            .or_default()
            .push(trade.trade_id.clone());
        state
            .by_order
            .entry(trade.taker_order_id.clone())
            .or_default()
            .push(trade.trade_id.clone());
        Ok(())
    }

    fn get_by_id(&self, trade_id: &str) -> Result<TradeView, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .trades
            .get(trade_id)
            .cloned()
            .ok_or_else(|| ProjectionError::TradeNotFound(trade_id.to_string()))
    }

    fn list_by_symbol(
        &self,
        symbol: &str,
        from_sequence: i64,
        limit: usize,
    ) -> Result<Vec<TradeView>, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.by_symbol.get(symbol).cloned().unwrap_or_default();
        let mut views: Vec<_> = ids
            .iter()
            .filter_map(|id| state.trades.get(id).cloned())
            .filter(|t| from_sequence <= 0 || t.sequence >= from_sequence)
            .collect();
        if limit > 0 && views.len() > limit {
            views.truncate(limit);
        }
        Ok(views)
    }

    fn list_by_order(
        &self,
        order_id: &str,
        limit: usize,
    ) -> Result<Vec<TradeView>, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let ids = state.by_order.get(order_id).cloned().unwrap_or_default();
        let mut views: Vec<_> = ids
            .iter()
            .filter_map(|id| state.trades.get(id).cloned())
            .collect();
        if limit > 0 && views.len() > limit {
            views.truncate(limit);
        }
        Ok(views)
    }

    fn last_sequence(&self, symbol: &str) -> Result<i64, ProjectionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.last_sequence.get(symbol).copied().unwrap_or(0))
    }

    fn set_last_sequence(&self, symbol: &str, sequence: i64) -> Result<(), ProjectionError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let current = state.last_sequence.get(symbol).copied().unwrap_or(0);
        if sequence < current {
            return Err(ProjectionError::SequenceRegression {
                symbol: symbol.to_string(),
                current,
                new: sequence,
            });
        }
        state.last_sequence.insert(symbol.to_string(), sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::order::OrderStatus;

    fn order_view(order_id: &str, account: &str) -> OrderView {
        OrderView {
            order_id: order_id.into(),
            client_order_id: format!("c-{}", order_id),
            account_id: account.into(),
            symbol: "BTC-USDT".into(),
            side: "BUY".into(),
            price: 43_000,
            quantity: 100,
            remaining_qty: 100,
            filled_qty: 0,
            status: OrderStatus::New,
            created_at: 1,
            updated_at: 1,
            last_sequence: 1,
        }
    }

    #[test]
    fn test_save_and_lookup_paths() {
        let repo = MemoryOrderRepository::new();
        repo.save(&order_view("o1", "acc-1")).unwrap();
        repo.save(&order_view("o2", "acc-1")).unwrap();

        assert_eq!(repo.get_by_id("o1").unwrap().order_id, "o1");
        assert_eq!(
            repo.get_by_client_order_id("acc-1", "c-o2").unwrap().order_id,
            "o2"
        );
        assert_eq!(repo.list_by_account("acc-1", 0).unwrap().len(), 2);
        assert_eq!(repo.list_by_symbol("BTC-USDT", 1).unwrap().len(), 1);
        assert!(matches!(
            repo.get_by_id("missing"),
            Err(ProjectionError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_update_does_not_duplicate_indexes() {
        let repo = MemoryOrderRepository::new();
        repo.save(&order_view("o1", "acc-1")).unwrap();
        let mut updated = order_view("o1", "acc-1");
        updated.remaining_qty = 40;
        repo.save(&updated).unwrap();

        assert_eq!(repo.list_by_account("acc-1", 0).unwrap().len(), 1);
        assert_eq!(repo.get_by_id("o1").unwrap().remaining_qty, 40);
    }

    #[test]
    fn test_order_cursor_rejects_regression() {
        let repo = MemoryOrderRepository::new();
        repo.set_last_sequence("BTC-USDT", 5).unwrap();
        assert!(matches!(
            repo.set_last_sequence("BTC-USDT", 3),
            Err(ProjectionError::SequenceRegression { .. })
        ));
        // Re-setting the same value is allowed (idempotent retry).
        repo.set_last_sequence("BTC-USDT", 5).unwrap();
    }

    fn trade_view(trade_id: &str, seq: i64) -> TradeView {
        TradeView {
            trade_id: trade_id.into(),
            symbol: "BTC-USDT".into(),
            maker_order_id: "m1".into(),
            taker_order_id: "t1".into(),
            maker_account_id: "acc-1".into(),
            taker_account_id: "acc-2".into(),
            price: 43_000,
            quantity: 100,
            occurred_at: seq,
            sequence: seq,
        }
    }

    #[test]
    fn test_trade_save_idempotent_and_conflicting() {
        let repo = MemoryTradeRepository::new();
        repo.save(&trade_view("trd_1", 2)).unwrap();
        // Identical re-save is a no-op.
        repo.save(&trade_view("trd_1", 2)).unwrap();
        assert_eq!(repo.list_by_symbol("BTC-USDT", 0, 0).unwrap().len(), 1);

        // Same id, different body.
        let mut conflicting = trade_view("trd_1", 2);
        conflicting.quantity = 999;
        assert!(matches!(
            repo.save(&conflicting),
            Err(ProjectionError::TradeConflict(_))
        ));
    }

    #[test]
    fn test_trades_listed_in_sequence_order() {
        let repo = MemoryTradeRepository::new();
        repo.save(&trade_view("trd_2", 5)).unwrap();
        repo.save(&trade_view("trd_1", 2)).unwrap();

        let trades = repo.list_by_symbol("BTC-USDT", 0, 0).unwrap();
        let sequences: Vec<_> = trades.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![2, 5]);

        let filtered = repo.list_by_symbol("BTC-USDT", 3, 0).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].trade_id, "trd_2");
    }

    #[test]
    fn test_trades_indexed_by_both_orders() {
        let repo = MemoryTradeRepository::new();
        repo.save(&trade_view("trd_1", 2)).unwrap();
        assert_eq!(repo.list_by_order("m1", 0).unwrap().len(), 1);
        assert_eq!(repo.list_by_order("t1", 0).unwrap().len(), 1);
    }
}
