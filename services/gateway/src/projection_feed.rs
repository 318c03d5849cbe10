//! Feeds the read models by tailing the event log.
//!
//! Runs on a blocking thread for the lifetime of the process: every tick it
//! reads each symbol's log from the last projected sequence and applies the
//! new events in order. A projection failure for one symbol stops that
//! symbol's views from advancing (the projector refuses gaps and
//! regressions) without affecting the others.

use persistence::EventStore;
use projection::{MemoryOrderRepository, OrderRepository, Projector};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(
    event_store: Arc<dyn EventStore>,
    projector: Projector,
    order_views: Arc<MemoryOrderRepository>,
) {
    loop {
        if let Err(err) = tick(event_store.as_ref(), &projector, order_views.as_ref()) {
            tracing::warn!(error = %err, "projection tick failed");
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn tick(
    event_store: &dyn EventStore,
    projector: &Projector,
    order_views: &MemoryOrderRepository,
) -> Result<(), anyhow::Error> {
    for symbol in event_store.list_symbols()? {
        let last = order_views.last_sequence(&symbol)?;
        let events = event_store.read_from(&symbol, last + 1)?;
        for event in &events {
            projector.project(event)?;
        }
    }
    Ok(())
}
