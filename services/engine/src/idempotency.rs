//! TTL-scoped idempotency cache.
//!
//! Keys are `(account, symbol, command kind, idempotency key)` so the same
//! caller token under a different account or symbol never collides. The
//! store is owned by exactly one shard executor, so it needs no lock.

use crate::envelope::{CommandExecResult, CommandKind};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub account_id: String,
    pub symbol: String,
    pub command_kind: CommandKind,
    pub idempotency_key: String,
}

/// Cached outcome of a previously executed command.
#[derive(Debug, Clone)]
struct IdempotencyRecord {
    payload_fingerprint: String,
    result: CommandExecResult,
    expires_at: Instant,
}

/// Outcome of consulting the cache before executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyCheck {
    /// Not seen (or expired): execute the command.
    Miss,
    /// Replay with a matching fingerprint: return the cached result.
    Hit(CommandExecResult),
    /// Same key, different payload: never execute.
    Conflict,
}

pub struct IdempotencyStore {
    records: HashMap<IdempotencyKey, IdempotencyRecord>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: HashMap::new(),
            ttl,
        }
    }

    pub fn check(&self, key: &IdempotencyKey, payload_fingerprint: &str) -> IdempotencyCheck {
        let Some(record) = self.records.get(key) else {
            return IdempotencyCheck::Miss;
        };
        if Instant::now() >= record.expires_at {
            return IdempotencyCheck::Miss;
        }
        if record.payload_fingerprint != payload_fingerprint {
            return IdempotencyCheck::Conflict;
        }
        IdempotencyCheck::Hit(record.result.clone())
    }

    pub fn store(
        &mut self,
        key: IdempotencyKey,
        payload_fingerprint: String,
        result: CommandExecResult,
    ) {
        self.records.insert(
            key,
            IdempotencyRecord {
                payload_fingerprint,
                result,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Evict expired records. Called periodically by the shard executor.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        self.records.retain(|_, record| record.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CommandOutcome, ErrorCode};
    use matching_engine::CommandResult;

    fn key(token: &str) -> IdempotencyKey {
        IdempotencyKey {
            account_id: "acc-1".into(),
            symbol: "BTC-USDT".into(),
            command_kind: CommandKind::Place,
            idempotency_key: token.into(),
        }
    }

    fn ok_result() -> CommandExecResult {
        CommandExecResult::ok(CommandOutcome::Execution(CommandResult::default()))
    }

    #[test]
    fn test_miss_then_hit() {
        let mut store = IdempotencyStore::new(Duration::from_secs(60));
        assert_eq!(store.check(&key("k1"), "fp"), IdempotencyCheck::Miss);

        store.store(key("k1"), "fp".into(), ok_result());
        match store.check(&key("k1"), "fp") {
            IdempotencyCheck::Hit(result) => assert!(result.is_ok()),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_conflict_on_different_fingerprint() {
        let mut store = IdempotencyStore::new(Duration::from_secs(60));
        store.store(key("k1"), "fp-a".into(), ok_result());
        assert_eq!(store.check(&key("k1"), "fp-b"), IdempotencyCheck::Conflict);
    }

    #[test]
    fn test_keys_scoped_by_account_symbol_kind() {
        let mut store = IdempotencyStore::new(Duration::from_secs(60));
        store.store(key("k1"), "fp".into(), ok_result());

        let mut other_account = key("k1");
        other_account.account_id = "acc-2".into();
        assert_eq!(store.check(&other_account, "fp"), IdempotencyCheck::Miss);

        let mut other_symbol = key("k1");
        other_symbol.symbol = "ETH-USDT".into();
        assert_eq!(store.check(&other_symbol, "fp"), IdempotencyCheck::Miss);

        let mut other_kind = key("k1");
        other_kind.command_kind = CommandKind::Cancel;
        assert_eq!(store.check(&other_kind, "fp"), IdempotencyCheck::Miss);
    }

    #[test]
    fn test_expired_records_miss_and_sweep() {
        let mut store = IdempotencyStore::new(Duration::from_millis(1));
        store.store(key("k1"), "fp".into(), ok_result());
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.check(&key("k1"), "fp"), IdempotencyCheck::Miss);
        assert_eq!(store.len(), 1);
        store.cleanup();
        assert!(store.is_empty());
    }

    #[test]
    fn test_cached_error_results_replay() {
        let mut store = IdempotencyStore::new(Duration::from_secs(60));
        let failure = CommandExecResult::failed(ErrorCode::OrderNotFound, "order not found: x");
        store.store(key("k1"), "fp".into(), failure.clone());

        assert_eq!(store.check(&key("k1"), "fp"), IdempotencyCheck::Hit(failure));
    }
}
