//! Single-writer shard executor.
//!
//! A shard owns a bounded command queue, the order books for its symbols,
//! and an idempotency cache. All of that state moves into the executor
//! thread at `start()`, so every book mutation is single-writer by
//! construction. Recovery (snapshot load, event replay) runs strictly
//! before start, while the state is still accessible from the caller.

use crate::engine::EngineConfig;
use crate::envelope::{
    CommandEnvelope, CommandExecResult, CommandKind, CommandOutcome, CommandPayload, ErrorCode,
};
use crate::idempotency::{IdempotencyCheck, IdempotencyKey, IdempotencyStore};
use matching_engine::{BookError, Event, OrderBook, OrderBookState};
use persistence::{EventStore, Snapshot, SnapshotStore};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use types::now_nanos;
use types::order::PlaceOrderRequest;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("shard is already started")]
    AlreadyStarted,

    #[error(transparent)]
    Book(#[from] BookError),
}

struct CommandRequest {
    envelope: CommandEnvelope,
    reply: mpsc::Sender<CommandExecResult>,
}

/// State owned by the executor thread once the shard is started.
struct ShardWorker {
    id: usize,
    books: HashMap<String, OrderBook>,
    idem: IdempotencyStore,
    event_store: Option<std::sync::Arc<dyn EventStore>>,
    snapshot_store: Option<std::sync::Arc<dyn SnapshotStore>>,
    /// Events persisted per symbol since the last snapshot.
    event_counters: HashMap<String, i64>,
    snapshot_interval: i64,
}

pub struct Shard {
    id: usize,
    queue_size: usize,
    sweep_interval: Duration,
    /// Present until `start()` moves it into the executor thread.
    worker: Option<ShardWorker>,
    sender: RwLock<Option<SyncSender<CommandRequest>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Shard {
    pub fn new(id: usize, config: &EngineConfig) -> Self {
        Self {
            id,
            queue_size: config.queue_size,
            sweep_interval: config.idempotency_sweep_interval,
            worker: Some(ShardWorker {
                id,
                books: HashMap::new(),
                idem: IdempotencyStore::new(config.idempotency_ttl),
                event_store: None,
                snapshot_store: None,
                event_counters: HashMap::new(),
                snapshot_interval: config.snapshot_interval_events,
            }),
            sender: RwLock::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Attach an event log. Only possible before start.
    pub fn set_event_store(
        &mut self,
        store: std::sync::Arc<dyn EventStore>,
    ) -> Result<(), ShardError> {
        let worker = self.worker.as_mut().ok_or(ShardError::AlreadyStarted)?;
        worker.event_store = Some(store);
        Ok(())
    }

    /// Attach a snapshot store. Only possible before start.
    pub fn set_snapshot_store(
        &mut self,
        store: std::sync::Arc<dyn SnapshotStore>,
    ) -> Result<(), ShardError> {
        let worker = self.worker.as_mut().ok_or(ShardError::AlreadyStarted)?;
        worker.snapshot_store = Some(store);
        Ok(())
    }

    /// Restore a symbol's book from snapshot state. Only before start.
    pub fn load_snapshot(
        &mut self,
        symbol: &str,
        state: Option<&OrderBookState>,
        last_sequence: i64,
    ) -> Result<(), ShardError> {
        let worker = self.worker.as_mut().ok_or(ShardError::AlreadyStarted)?;
        let book = worker
            .books
            .entry(symbol.to_string())
            .or_insert_with(|| OrderBook::new(symbol));
        if let Some(state) = state {
            book.import_state(state)?;
        }
        // Keep the sequence monotonic even for older snapshot payloads.
        if book.event_seq() < last_sequence {
            book.set_event_seq(last_sequence);
        }
        Ok(())
    }

    /// Replay a validated batch of events to rebuild a symbol's book. Only
    /// before start.
    ///
    /// `OrderAccepted` re-runs the normal placement path (matches re-derive
    /// deterministically), `OrderMatched` is skipped, `OrderCanceled`
    /// re-runs cancel with not-found/already-terminal tolerated, since the
    /// deterministic re-matching may already have consumed the order.
    pub fn replay_events(&mut self, symbol: &str, events: &[Event]) -> Result<(), ShardError> {
        if events.is_empty() {
            return Ok(());
        }
        let worker = self.worker.as_mut().ok_or(ShardError::AlreadyStarted)?;
        let book = worker
            .books
            .entry(symbol.to_string())
            .or_insert_with(|| OrderBook::new(symbol));

        let mut max_seq = 0;
        for event in events {
            if event.sequence() > max_seq {
                max_seq = event.sequence();
            }
            match event {
                Event::OrderAccepted(e) => {
                    let req = PlaceOrderRequest {
                        order_id: e.order_id.clone(),
                        client_order_id: e.client_order_id.clone(),
                        account_id: e.account_id.clone(),
                        symbol: e.symbol.clone(),
                        side: e.side,
                        price: e.price,
                        quantity: e.quantity,
                    };
                    // Replay emits fresh events into the result; they are
                    // intentionally dropped here.
                    book.place_limit(&req)?;
                }
                Event::OrderMatched(_) => continue,
                Event::OrderCanceled(e) => {
                    let req = types::order::CancelOrderRequest {
                        order_id: e.order_id.clone(),
                        account_id: e.account_id.clone(),
                        symbol: e.symbol.clone(),
                    };
                    match book.cancel(&req) {
                        Ok(_) => {}
                        Err(
                            BookError::OrderNotFound(_)
                            | BookError::AlreadyFilled
                            | BookError::AlreadyCanceled,
                        ) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
        // The next emitted event continues densely after the replayed tail.
        book.set_event_seq(max_seq);
        Ok(())
    }

    /// Start the executor thread. Idempotent: a started shard stays started.
    pub fn start(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let (tx, rx) = mpsc::sync_channel(self.queue_size);
        let sweep_interval = self.sweep_interval;
        let handle = std::thread::spawn(move || run_executor(worker, rx, sweep_interval));

        *self.sender.write().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Submit a command and block until its result is produced.
    ///
    /// Fails fast with `INVALID_ARGUMENT` when the shard is not running.
    pub fn submit(&self, envelope: CommandEnvelope) -> CommandExecResult {
        let sender = {
            let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => {
                    return CommandExecResult::failed(
                        ErrorCode::InvalidArgument,
                        "shard is stopped",
                    )
                }
            }
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let request = CommandRequest {
            envelope,
            reply: reply_tx,
        };
        if sender.send(request).is_err() {
            return CommandExecResult::failed(ErrorCode::InvalidArgument, "shard is stopped");
        }
        match reply_rx.recv() {
            Ok(result) => result,
            Err(_) => CommandExecResult::failed(
                ErrorCode::InternalError,
                "shard executor terminated before replying",
            ),
        }
    }

    /// Stop the executor: close the queue, drain outstanding work, join.
    /// Idempotent.
    pub fn stop(&self) {
        self.sender
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run_executor(mut worker: ShardWorker, rx: Receiver<CommandRequest>, sweep_interval: Duration) {
    loop {
        match rx.recv_timeout(sweep_interval) {
            Ok(request) => {
                let result = worker.process(&request.envelope);
                let _ = request.reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => worker.idem.cleanup(),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

impl ShardWorker {
    fn process(&mut self, envelope: &CommandEnvelope) -> CommandExecResult {
        let key = IdempotencyKey {
            account_id: envelope.account_id.clone(),
            symbol: envelope.symbol.clone(),
            command_kind: envelope.command_kind,
            idempotency_key: envelope.idempotency_key.clone(),
        };

        match self.idem.check(&key, &envelope.payload_fingerprint) {
            IdempotencyCheck::Conflict => {
                return CommandExecResult::failed(
                    ErrorCode::DuplicateRequest,
                    "idempotency key conflict: same key with different payload",
                );
            }
            IdempotencyCheck::Hit(result) => return result,
            IdempotencyCheck::Miss => {}
        }

        let result = match envelope.command_kind {
            CommandKind::Place => self.execute_place(envelope),
            CommandKind::Cancel => self.execute_cancel(envelope),
            CommandKind::Query => self.execute_query(envelope),
        };

        // An append failure leaves the outcome unknown to the caller; it
        // must be able to retry under the same key, so the failure is not
        // cached.
        if result.error_code != ErrorCode::InternalError {
            self.idem
                .store(key, envelope.payload_fingerprint.clone(), result.clone());
        }
        result
    }

    fn execute_place(&mut self, envelope: &CommandEnvelope) -> CommandExecResult {
        let CommandPayload::Place(request) = &envelope.payload else {
            return CommandExecResult::failed(
                ErrorCode::InvalidArgument,
                "invalid payload type for PLACE command",
            );
        };

        let book = self
            .books
            .entry(envelope.symbol.clone())
            .or_insert_with(|| OrderBook::new(&envelope.symbol));

        let result = match book.place_limit(request) {
            Ok(result) => result,
            Err(err) => return book_failure(err),
        };

        if let Some(failure) = self.persist_events(&envelope.symbol, &result.events) {
            return failure;
        }
        CommandExecResult::ok(CommandOutcome::Execution(result))
    }

    fn execute_cancel(&mut self, envelope: &CommandEnvelope) -> CommandExecResult {
        let CommandPayload::Cancel(request) = &envelope.payload else {
            return CommandExecResult::failed(
                ErrorCode::InvalidArgument,
                "invalid payload type for CANCEL command",
            );
        };

        let Some(book) = self.books.get_mut(&envelope.symbol) else {
            return CommandExecResult::failed(
                ErrorCode::OrderNotFound,
                format!("order book not found for symbol: {}", envelope.symbol),
            );
        };

        let result = match book.cancel(request) {
            Ok(result) => result,
            Err(err) => return book_failure(err),
        };

        if let Some(failure) = self.persist_events(&envelope.symbol, &result.events) {
            return failure;
        }
        CommandExecResult::ok(CommandOutcome::Execution(result))
    }

    fn execute_query(&mut self, envelope: &CommandEnvelope) -> CommandExecResult {
        let CommandPayload::Query(request) = &envelope.payload else {
            return CommandExecResult::failed(
                ErrorCode::InvalidArgument,
                "invalid payload type for QUERY command",
            );
        };
        if let Err(err) = request.validate() {
            return CommandExecResult::failed(ErrorCode::InvalidArgument, err.to_string());
        }

        let Some(book) = self.books.get(&envelope.symbol) else {
            return CommandExecResult::failed(
                ErrorCode::OrderNotFound,
                format!("order book not found for symbol: {}", envelope.symbol),
            );
        };

        let snapshot = match book.order_snapshot(&request.order_id) {
            Ok(snapshot) => snapshot,
            Err(err) => return book_failure(err),
        };

        // Closed orders keep no owner; their minimal snapshot is readable.
        if !snapshot.account_id.is_empty() && snapshot.account_id != request.account_id {
            return CommandExecResult::failed(
                ErrorCode::Unauthorized,
                "unauthorized: order belongs to a different account",
            );
        }
        CommandExecResult::ok(CommandOutcome::Order(snapshot))
    }

    /// Append events in order; on success, drive the snapshot cadence.
    /// Returns the failure result when an append fails.
    fn persist_events(&mut self, symbol: &str, events: &[Event]) -> Option<CommandExecResult> {
        let Some(event_store) = &self.event_store else {
            return None;
        };
        if events.is_empty() {
            return None;
        }

        for event in events {
            if let Err(err) = event_store.append(symbol, event) {
                tracing::error!(
                    shard = self.id,
                    symbol,
                    sequence = event.sequence(),
                    error = %err,
                    "event append failed"
                );
                return Some(CommandExecResult::failed(
                    ErrorCode::InternalError,
                    format!("failed to persist event: {}", err),
                ));
            }
        }

        let last_seq = events.last().map(Event::sequence).unwrap_or(0);
        self.maybe_snapshot(symbol, events.len() as i64, last_seq);
        None
    }

    fn maybe_snapshot(&mut self, symbol: &str, persisted: i64, last_persisted_seq: i64) {
        if self.snapshot_store.is_none() || persisted <= 0 {
            return;
        }
        let counter = self.event_counters.entry(symbol.to_string()).or_insert(0);
        *counter += persisted;
        if *counter < self.snapshot_interval {
            return;
        }
        *counter %= self.snapshot_interval;
        self.write_snapshot(symbol, last_persisted_seq);
    }

    fn write_snapshot(&mut self, symbol: &str, last_persisted_seq: i64) {
        let Some(snapshot_store) = &self.snapshot_store else {
            return;
        };
        let Some(book) = self.books.get(symbol) else {
            return;
        };

        let mut state = book.export_state();
        if state.event_seq < last_persisted_seq {
            state.event_seq = last_persisted_seq;
        }
        let snapshot = Snapshot {
            version: persistence::snapshot_store::SNAPSHOT_VERSION,
            symbol: symbol.to_string(),
            last_sequence: state.event_seq,
            captured_at: now_nanos(),
            orderbook: Some(state),
        };
        if let Err(err) = snapshot_store.save(&snapshot) {
            // The snapshot is an optimization; the command itself succeeded.
            tracing::warn!(shard = self.id, symbol, error = %err, "snapshot save failed");
        }
    }
}

fn book_failure(err: BookError) -> CommandExecResult {
    let code = match &err {
        BookError::InvalidRequest(_)
        | BookError::SymbolMismatch { .. }
        | BookError::DuplicateOrderId(_) => ErrorCode::InvalidArgument,
        BookError::OrderNotFound(_) => ErrorCode::OrderNotFound,
        BookError::AlreadyFilled => ErrorCode::OrderAlreadyFilled,
        BookError::AlreadyCanceled => ErrorCode::OrderAlreadyCanceled,
        BookError::Unauthorized => ErrorCode::Unauthorized,
        BookError::InvalidState(_) => ErrorCode::InternalError,
    };
    CommandExecResult::failed(code, err.to_string())
}
