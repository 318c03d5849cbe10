//! End-to-end command flows through the sharded engine.

use engine::{
    payload_fingerprint, CommandEnvelope, CommandExecResult, CommandKind, CommandOutcome,
    CommandPayload, Engine, EngineConfig, ErrorCode,
};
use matching_engine::Event;
use persistence::{EventStore, FileEventStore, FileSnapshotStore, SnapshotStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use types::order::{CancelOrderRequest, PlaceOrderRequest, QueryOrderRequest, Side};
use types::{ids, now_nanos};

fn place_envelope(
    idem_key: &str,
    account: &str,
    side: Side,
    price: i64,
    qty: i64,
) -> CommandEnvelope {
    let order_id = ids::order_id_for(account, "BTC-USDT", idem_key);
    let request = PlaceOrderRequest {
        order_id,
        client_order_id: format!("c-{}", idem_key),
        account_id: account.into(),
        symbol: "BTC-USDT".into(),
        side,
        price,
        quantity: qty,
    };
    CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Place,
        idempotency_key: idem_key.into(),
        symbol: "BTC-USDT".into(),
        account_id: account.into(),
        payload_fingerprint: payload_fingerprint(&request).unwrap(),
        payload: CommandPayload::Place(request),
        created_at: now_nanos(),
    }
}

fn cancel_envelope(idem_key: &str, account: &str, order_id: &str) -> CommandEnvelope {
    let request = CancelOrderRequest {
        order_id: order_id.into(),
        account_id: account.into(),
        symbol: "BTC-USDT".into(),
    };
    CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Cancel,
        idempotency_key: idem_key.into(),
        symbol: "BTC-USDT".into(),
        account_id: account.into(),
        payload_fingerprint: payload_fingerprint(&request).unwrap(),
        payload: CommandPayload::Cancel(request),
        created_at: now_nanos(),
    }
}

fn query_envelope(idem_key: &str, account: &str, order_id: &str) -> CommandEnvelope {
    let request = QueryOrderRequest {
        order_id: order_id.into(),
        account_id: account.into(),
        symbol: "BTC-USDT".into(),
    };
    CommandEnvelope {
        command_id: ids::command_id(),
        command_kind: CommandKind::Query,
        idempotency_key: idem_key.into(),
        symbol: "BTC-USDT".into(),
        account_id: account.into(),
        payload_fingerprint: payload_fingerprint(&request).unwrap(),
        payload: CommandPayload::Query(request),
        created_at: now_nanos(),
    }
}

fn started_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig {
        shard_count: 4,
        queue_size: 16,
        ..EngineConfig::default()
    });
    engine.start();
    engine
}

fn execution(result: &CommandExecResult) -> &matching_engine::CommandResult {
    result
        .outcome
        .as_ref()
        .and_then(CommandOutcome::as_execution)
        .expect("expected execution outcome")
}

#[test]
fn test_fifo_matching_through_engine() {
    let engine = started_engine();

    for (key, account) in [("k1", "acc-1"), ("k2", "acc-2"), ("k3", "acc-3")] {
        let result = engine.submit(place_envelope(key, account, Side::Buy, 43_000, 100));
        assert!(result.is_ok(), "place failed: {:?}", result.error);
    }

    let result = engine.submit(place_envelope("k4", "acc-4", Side::Sell, 43_000, 250));
    assert!(result.is_ok());
    let execution = execution(&result);
    let fills: Vec<_> = execution.trades.iter().map(|t| t.quantity).collect();
    assert_eq!(fills, vec![100, 100, 50]);
    assert_eq!(
        execution.trades[0].maker_order_id,
        ids::order_id_for("acc-1", "BTC-USDT", "k1")
    );
}

#[test]
fn test_idempotent_replay_returns_cached_result() {
    let engine = started_engine();
    let envelope = place_envelope("k1", "acc-1", Side::Buy, 43_000, 100);

    let first = engine.submit(envelope.clone());
    assert!(first.is_ok());
    let second = engine.submit(envelope);
    assert_eq!(first, second);

    // The command executed once: the order id is not rejected as duplicate,
    // and the book still holds a single resting order of qty 100.
    let order_id = ids::order_id_for("acc-1", "BTC-USDT", "k1");
    let query = engine.submit(query_envelope("q1", "acc-1", &order_id));
    let snapshot = query
        .outcome
        .as_ref()
        .and_then(CommandOutcome::as_order)
        .unwrap();
    assert_eq!(snapshot.remaining_qty, 100);
}

#[test]
fn test_conflicting_payload_rejected() {
    let engine = started_engine();
    engine.submit(place_envelope("k1", "acc-1", Side::Buy, 43_000, 100));

    // Same idempotency key, different quantity.
    let conflicting = place_envelope("k1", "acc-1", Side::Buy, 43_000, 999);
    let result = engine.submit(conflicting);
    assert_eq!(result.error_code, ErrorCode::DuplicateRequest);
}

#[test]
fn test_cancel_and_terminal_errors() {
    let engine = started_engine();
    engine.submit(place_envelope("k1", "acc-1", Side::Buy, 43_000, 100));
    let order_id = ids::order_id_for("acc-1", "BTC-USDT", "k1");

    let result = engine.submit(cancel_envelope("c1", "acc-1", &order_id));
    assert!(result.is_ok());
    let changes = &execution(&result).status_changes;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].remaining_qty, 100);

    // A second cancel under a fresh key hits the terminal state.
    let again = engine.submit(cancel_envelope("c2", "acc-1", &order_id));
    assert_eq!(again.error_code, ErrorCode::OrderAlreadyCanceled);
}

#[test]
fn test_query_authorization() {
    let engine = started_engine();
    engine.submit(place_envelope("k1", "acc-1", Side::Buy, 43_000, 100));
    let order_id = ids::order_id_for("acc-1", "BTC-USDT", "k1");

    let other = engine.submit(query_envelope("q1", "acc-2", &order_id));
    assert_eq!(other.error_code, ErrorCode::Unauthorized);

    let missing = engine.submit(query_envelope("q2", "acc-1", "ord_missing"));
    assert_eq!(missing.error_code, ErrorCode::OrderNotFound);
}

#[test]
fn test_envelope_validation() {
    let engine = started_engine();

    let mut envelope = place_envelope("k1", "acc-1", Side::Buy, 43_000, 100);
    envelope.idempotency_key = String::new();
    assert_eq!(
        engine.submit(envelope).error_code,
        ErrorCode::InvalidArgument
    );

    let mut envelope = place_envelope("k2", "acc-1", Side::Buy, 43_000, 100);
    envelope.command_kind = CommandKind::Cancel;
    assert_eq!(
        engine.submit(envelope).error_code,
        ErrorCode::InvalidArgument
    );
}

#[test]
fn test_submissions_after_close_fail_fast() {
    let engine = started_engine();
    engine.close();
    let result = engine.submit(place_envelope("k1", "acc-1", Side::Buy, 43_000, 100));
    assert_eq!(result.error_code, ErrorCode::InvalidArgument);

    // Close is idempotent.
    engine.close();
}

#[test]
fn test_same_symbol_routes_to_same_shard() {
    let engine = Engine::new(EngineConfig::default());
    assert_eq!(engine.shard_id("BTC-USDT"), engine.shard_id("BTC-USDT"));
    assert!(engine.shard_id("ETH-USDT") < 8);
}

#[test]
fn test_events_persisted_in_order() {
    let tmp = TempDir::new().unwrap();
    let event_store: Arc<FileEventStore> =
        Arc::new(FileEventStore::open(tmp.path().join("events")).unwrap());

    let mut engine = Engine::new(EngineConfig {
        shard_count: 2,
        queue_size: 16,
        ..EngineConfig::default()
    });
    engine.set_event_store(event_store.clone()).unwrap();
    engine.start();

    engine.submit(place_envelope("k1", "acc-1", Side::Sell, 43_000, 100));
    engine.submit(place_envelope("k2", "acc-2", Side::Buy, 43_000, 40));
    engine.close();

    let events = event_store.read_from("BTC-USDT", 1).unwrap();
    let kinds: Vec<_> = events.iter().map(Event::event_type).collect();
    assert_eq!(kinds, vec!["OrderAccepted", "OrderAccepted", "OrderMatched"]);
    let sequences: Vec<_> = events.iter().map(Event::sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(event_store.last_sequence("BTC-USDT").unwrap(), 3);
}

#[test]
fn test_snapshot_written_after_interval() {
    let tmp = TempDir::new().unwrap();
    let event_store: Arc<FileEventStore> =
        Arc::new(FileEventStore::open(tmp.path().join("events")).unwrap());
    let snapshot_store: Arc<FileSnapshotStore> =
        Arc::new(FileSnapshotStore::open(tmp.path().join("snapshots")).unwrap());

    let mut engine = Engine::new(EngineConfig {
        shard_count: 1,
        queue_size: 16,
        snapshot_interval_events: 2,
        idempotency_sweep_interval: Duration::from_millis(50),
        ..EngineConfig::default()
    });
    engine.set_event_store(event_store).unwrap();
    engine.set_snapshot_store(snapshot_store.clone()).unwrap();
    engine.start();

    engine.submit(place_envelope("k1", "acc-1", Side::Buy, 42_000, 100));
    engine.submit(place_envelope("k2", "acc-1", Side::Buy, 42_100, 100));
    engine.close();

    let snapshots = snapshot_store.list("BTC-USDT").unwrap();
    assert!(!snapshots.is_empty());
    assert_eq!(snapshots[0].last_sequence, 2);

    let loaded = snapshot_store.load("BTC-USDT").unwrap().unwrap();
    let state = loaded.orderbook.unwrap();
    assert_eq!(state.orders.len(), 2);
}

#[test]
fn test_concurrency_isolation_across_symbols() {
    // Parallel submitters on different symbols never interleave state:
    // each symbol's book ends up with exactly its own resting volume and a
    // dense event sequence.
    let engine = Arc::new(started_engine());
    let symbols = ["BTC-USDT", "ETH-USDT", "SOL-USDT"];

    let handles: Vec<_> = symbols
        .iter()
        .map(|symbol| {
            let engine = engine.clone();
            let symbol = symbol.to_string();
            std::thread::spawn(move || {
                for i in 0..20 {
                    let request = PlaceOrderRequest {
                        order_id: ids::order_id_for("acc-1", &symbol, &format!("k{}", i)),
                        client_order_id: format!("c{}", i),
                        account_id: "acc-1".into(),
                        symbol: symbol.clone(),
                        side: Side::Buy,
                        price: 40_000 + i,
                        quantity: 10,
                    };
                    let envelope = CommandEnvelope {
                        command_id: ids::command_id(),
                        command_kind: CommandKind::Place,
                        idempotency_key: format!("k{}", i),
                        symbol: symbol.clone(),
                        account_id: "acc-1".into(),
                        payload_fingerprint: payload_fingerprint(&request).unwrap(),
                        payload: CommandPayload::Place(request),
                        created_at: now_nanos(),
                    };
                    let result = engine.submit(envelope);
                    assert!(result.is_ok(), "{:?}", result.error);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Each symbol saw its own dense sequence 1..=20.
    for symbol in symbols {
        let request = QueryOrderRequest {
            order_id: ids::order_id_for("acc-1", symbol, "k19"),
            account_id: "acc-1".into(),
            symbol: symbol.into(),
        };
        let envelope = CommandEnvelope {
            command_id: ids::command_id(),
            command_kind: CommandKind::Query,
            idempotency_key: format!("q-{}", symbol),
            symbol: symbol.into(),
            account_id: "acc-1".into(),
            payload_fingerprint: payload_fingerprint(&request).unwrap(),
            payload: CommandPayload::Query(request),
            created_at: now_nanos(),
        };
        let result = engine.submit(envelope);
        assert!(result.is_ok());
        let snapshot = result
            .outcome
            .as_ref()
            .and_then(CommandOutcome::as_order)
            .unwrap();
        assert_eq!(snapshot.symbol, symbol);
        assert_eq!(snapshot.remaining_qty, 10);
    }
    engine.close();
}

#[test]
fn test_deterministic_event_stream() {
    // The same command sequence produces the same events, modulo
    // observational timestamps.
    fn run() -> Vec<(String, i64, String)> {
        let engine = started_engine();
        let mut log = Vec::new();
        for result in [
            engine.submit(place_envelope("k1", "acc-1", Side::Sell, 43_000, 100)),
            engine.submit(place_envelope("k2", "acc-1", Side::Sell, 43_100, 100)),
            engine.submit(place_envelope("k3", "acc-2", Side::Buy, 43_100, 150)),
        ] {
            let execution = result
                .outcome
                .as_ref()
                .and_then(CommandOutcome::as_execution)
                .unwrap()
                .clone();
            for event in &execution.events {
                log.push((
                    event.event_type().to_string(),
                    event.sequence(),
                    serde_describe(event),
                ));
            }
        }
        engine.close();
        log
    }

    fn serde_describe(event: &Event) -> String {
        match event {
            Event::OrderAccepted(e) => format!("{}:{}:{}", e.order_id, e.price, e.quantity),
            Event::OrderMatched(e) => format!(
                "{}:{}:{}:{}:{}",
                e.trade_id, e.maker_order_id, e.taker_order_id, e.price, e.quantity
            ),
            Event::OrderCanceled(e) => format!("{}:{}", e.order_id, e.remaining_qty),
        }
    }

    assert_eq!(run(), run());
}
