//! Startup recovery: rebuild books and the ledger from disk before the
//! engine accepts commands.

use anyhow::{bail, Context};
use engine::Engine;
use ledger::{CancelIntent, Ledger, PlaceIntent, TradeIntent};
use matching_engine::Event;
use persistence::recovery::validate_sequence;
use persistence::{EventStore, RecoveryService};
use std::collections::HashMap;
use types::order::Side;

/// Recover every symbol the event log knows about.
///
/// Per symbol: load the latest snapshot into the owning shard, replay the
/// validated event tail into the book, then replay the *full* event history
/// into the ledger (the snapshot covers only book state).
pub fn perform_recovery(
    engine: &mut Engine,
    ledger: &dyn Ledger,
    event_store: &dyn EventStore,
    recovery_service: &RecoveryService,
) -> Result<(), anyhow::Error> {
    let symbols = event_store.list_symbols()?;
    if symbols.is_empty() {
        tracing::info!("no symbols to recover, starting fresh");
        return Ok(());
    }

    tracing::info!(count = symbols.len(), "recovering symbols");
    for symbol in &symbols {
        let (snapshot, events) = recovery_service
            .recover(symbol)
            .with_context(|| format!("recovery failed for {}", symbol))?;

        if let Some(snapshot) = &snapshot {
            tracing::info!(symbol, last_sequence = snapshot.last_sequence, "loaded snapshot");
            engine
                .load_symbol_snapshot(symbol, snapshot.orderbook.as_ref(), snapshot.last_sequence)
                .with_context(|| format!("failed to load snapshot for {}", symbol))?;
        }

        tracing::info!(symbol, count = events.len(), "replaying events");
        engine
            .recover_symbol(symbol, &events)
            .with_context(|| format!("event replay failed for {}", symbol))?;

        // The ledger is not snapshotted: freezes and balances come from the
        // full history.
        let all_events = event_store
            .read_from(symbol, 1)
            .with_context(|| format!("failed to read ledger recovery events for {}", symbol))?;
        if let Some(first) = all_events.first() {
            if first.sequence() != 1 {
                bail!(
                    "ledger recovery start mismatch for {}: expected 1, got {}",
                    symbol,
                    first.sequence()
                );
            }
        }
        validate_sequence(&all_events)
            .with_context(|| format!("ledger recovery sequence validation failed for {}", symbol))?;
        replay_ledger_events(ledger, symbol, &all_events)
            .with_context(|| format!("ledger recovery failed for {}", symbol))?;

        tracing::info!(symbol, "recovered");
    }
    tracing::info!(count = symbols.len(), "recovery completed");
    Ok(())
}

/// Replay the event history into the ledger: accepted → freeze, matched →
/// settle, canceled → release.
///
/// Trade parties are resolved through the `(account, side)` metadata of the
/// accepted events, which every referenced maker/taker is guaranteed to
/// have emitted earlier in the stream.
pub fn replay_ledger_events(
    ledger: &dyn Ledger,
    symbol: &str,
    events: &[Event],
) -> Result<(), anyhow::Error> {
    struct OrderMeta {
        account_id: String,
        side: Side,
    }
    let mut order_lookup: HashMap<String, OrderMeta> = HashMap::new();

    for event in events {
        match event {
            Event::OrderAccepted(e) => {
                ledger
                    .check_and_freeze_for_place(&PlaceIntent {
                        account_id: e.account_id.clone(),
                        order_id: e.order_id.clone(),
                        symbol: symbol.to_string(),
                        side: e.side,
                        price: e.price,
                        quantity: e.quantity,
                    })
                    .with_context(|| format!("freeze failed for order {}", e.order_id))?;
                order_lookup.insert(
                    e.order_id.clone(),
                    OrderMeta {
                        account_id: e.account_id.clone(),
                        side: e.side,
                    },
                );
            }
            Event::OrderMatched(e) => {
                let Some(maker) = order_lookup.get(&e.maker_order_id) else {
                    bail!("missing maker order metadata for {}", e.maker_order_id);
                };
                let Some(taker) = order_lookup.get(&e.taker_order_id) else {
                    bail!("missing taker order metadata for {}", e.taker_order_id);
                };

                let intent = if maker.side == Side::Buy {
                    TradeIntent {
                        trade_id: e.trade_id.clone(),
                        buyer_account_id: maker.account_id.clone(),
                        buyer_order_id: e.maker_order_id.clone(),
                        seller_account_id: taker.account_id.clone(),
                        seller_order_id: e.taker_order_id.clone(),
                        symbol: symbol.to_string(),
                        price: e.price,
                        quantity: e.quantity,
                    }
                } else {
                    TradeIntent {
                        trade_id: e.trade_id.clone(),
                        buyer_account_id: taker.account_id.clone(),
                        buyer_order_id: e.taker_order_id.clone(),
                        seller_account_id: maker.account_id.clone(),
                        seller_order_id: e.maker_order_id.clone(),
                        symbol: symbol.to_string(),
                        price: e.price,
                        quantity: e.quantity,
                    }
                };
                ledger
                    .apply_trade(&intent)
                    .with_context(|| format!("trade apply failed for {}", e.trade_id))?;
            }
            Event::OrderCanceled(e) => {
                ledger
                    .release_on_cancel(&CancelIntent {
                        account_id: e.account_id.clone(),
                        order_id: e.order_id.clone(),
                        symbol: symbol.to_string(),
                    })
                    .with_context(|| format!("cancel release failed for order {}", e.order_id))?;
            }
        }
    }
    Ok(())
}
