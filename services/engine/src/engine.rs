//! Engine lifecycle: shard construction, recovery fan-in, submission.

use crate::envelope::{CommandEnvelope, CommandExecResult, ErrorCode};
use crate::router::Router;
use crate::shard::{Shard, ShardError};
use matching_engine::{Event, OrderBookState};
use persistence::{EventStore, SnapshotStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Engine configuration. Zero/empty fields fall back to the defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of shards (default 8).
    pub shard_count: usize,
    /// Command queue capacity per shard (default 1000). Zero means a
    /// rendezvous queue: every submit waits for the executor.
    pub queue_size: usize,
    /// Idempotency record TTL (default 24h).
    pub idempotency_ttl: Duration,
    /// Period of the idempotency sweep tick (default 60s).
    pub idempotency_sweep_interval: Duration,
    /// Events between snapshots per symbol (default 100).
    pub snapshot_interval_events: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shard_count: 8,
            queue_size: 1000,
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
            idempotency_sweep_interval: Duration::from_secs(60),
            snapshot_interval_events: 100,
        }
    }
}

impl EngineConfig {
    fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.shard_count == 0 {
            self.shard_count = defaults.shard_count;
        }
        if self.idempotency_ttl.is_zero() {
            self.idempotency_ttl = defaults.idempotency_ttl;
        }
        if self.idempotency_sweep_interval.is_zero() {
            self.idempotency_sweep_interval = defaults.idempotency_sweep_interval;
        }
        if self.snapshot_interval_events <= 0 {
            self.snapshot_interval_events = defaults.snapshot_interval_events;
        }
        self
    }
}

/// Routes commands to shards and manages their lifecycle.
///
/// Construction, store attachment and recovery run on `&mut self` before
/// `start()`; submission and close are `&self` and safe to share behind an
/// `Arc`.
pub struct Engine {
    router: Router,
    shards: Vec<Shard>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.normalized();
        let router = Router::new(config.shard_count);
        let shards = (0..config.shard_count)
            .map(|id| Shard::new(id, &config))
            .collect();
        Self {
            router,
            shards,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach an event log to every shard. Call before `start()`.
    pub fn set_event_store(&mut self, store: Arc<dyn EventStore>) -> Result<(), ShardError> {
        for shard in &mut self.shards {
            shard.set_event_store(store.clone())?;
        }
        Ok(())
    }

    /// Attach a snapshot store to every shard. Call before `start()`.
    pub fn set_snapshot_store(&mut self, store: Arc<dyn SnapshotStore>) -> Result<(), ShardError> {
        for shard in &mut self.shards {
            shard.set_snapshot_store(store.clone())?;
        }
        Ok(())
    }

    /// Restore one symbol's book from snapshot state. Call before `start()`.
    pub fn load_symbol_snapshot(
        &mut self,
        symbol: &str,
        state: Option<&OrderBookState>,
        last_sequence: i64,
    ) -> Result<(), ShardError> {
        let shard_id = self.router.route(symbol);
        self.shards[shard_id].load_snapshot(symbol, state, last_sequence)
    }

    /// Replay one symbol's validated event tail. Call before `start()`.
    pub fn recover_symbol(&mut self, symbol: &str, events: &[Event]) -> Result<(), ShardError> {
        let shard_id = self.router.route(symbol);
        self.shards[shard_id].replay_events(symbol, events)
    }

    /// Start every shard executor. Idempotent.
    pub fn start(&mut self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for shard in &mut self.shards {
            shard.start();
        }
    }

    /// Validate, route and execute a command, blocking for its result.
    pub fn submit(&self, envelope: CommandEnvelope) -> CommandExecResult {
        if self.closed.load(Ordering::SeqCst) {
            return CommandExecResult::failed(ErrorCode::InvalidArgument, "engine is closed");
        }
        if let Some(failure) = validate_envelope(&envelope) {
            return failure;
        }

        let shard_id = self.router.route(&envelope.symbol);
        self.shards[shard_id].submit(envelope)
    }

    /// Shard id a symbol routes to.
    pub fn shard_id(&self, symbol: &str) -> usize {
        self.router.route(symbol)
    }

    /// Stop all shards, draining outstanding work. Idempotent; submissions
    /// after close fail fast.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for shard in &self.shards {
            shard.stop();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_envelope(envelope: &CommandEnvelope) -> Option<CommandExecResult> {
    if envelope.idempotency_key.is_empty() {
        return Some(CommandExecResult::failed(
            ErrorCode::InvalidArgument,
            "idempotency_key required",
        ));
    }
    if envelope.symbol.is_empty() {
        return Some(CommandExecResult::failed(
            ErrorCode::InvalidArgument,
            "symbol required",
        ));
    }
    if envelope.account_id.is_empty() {
        return Some(CommandExecResult::failed(
            ErrorCode::InvalidArgument,
            "account_id required",
        ));
    }
    if envelope.payload.kind() != envelope.command_kind {
        return Some(CommandExecResult::failed(
            ErrorCode::InvalidArgument,
            format!(
                "payload does not match command kind {}",
                envelope.command_kind
            ),
        ));
    }
    None
}
