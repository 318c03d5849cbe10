use engine::Engine;
use ledger::Ledger;
use projection::{MemoryOrderRepository, MemoryTradeRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub ledger: Arc<dyn Ledger>,
    pub order_views: Arc<MemoryOrderRepository>,
    pub trade_views: Arc<MemoryTradeRepository>,
}
