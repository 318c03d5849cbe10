//! Recovery: latest snapshot + event tail, with sequence validation.
//!
//! Recovery refuses to hand out a replay set whose sequences are not dense:
//! a gap, a regression, a duplicate, or a tail that does not start where the
//! snapshot ends all indicate log corruption, and the affected symbol must
//! not accept new commands.

use crate::event_store::{EventStore, StoreError};
use crate::snapshot_store::{Snapshot, SnapshotStore};
use matching_engine::Event;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sequence gap detected: expected {expected}, got {got}")]
    SequenceGap { expected: i64, got: i64 },

    #[error("sequence regression: prev {prev}, got {got}")]
    SequenceRegression { prev: i64, got: i64 },

    #[error("duplicate sequence: {0}")]
    DuplicateSequence(i64),

    #[error("replay start mismatch: expected {expected}, got {got}")]
    StartMismatch { expected: i64, got: i64 },
}

/// Stitches snapshots and event tails back together per symbol.
pub struct RecoveryService {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
}

impl RecoveryService {
    pub fn new(event_store: Arc<dyn EventStore>, snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            event_store,
            snapshot_store,
        }
    }

    /// Recover one symbol: the latest snapshot (if any) plus the validated
    /// event tail starting right after it.
    pub fn recover(&self, symbol: &str) -> Result<(Option<Snapshot>, Vec<Event>), RecoveryError> {
        let snapshot = self.snapshot_store.load(symbol)?;
        let from_seq = snapshot.as_ref().map(|s| s.last_sequence + 1).unwrap_or(1);

        let events = self.event_store.read_from(symbol, from_seq)?;

        if let Some(first) = events.first() {
            if first.sequence() != from_seq {
                return Err(RecoveryError::StartMismatch {
                    expected: from_seq,
                    got: first.sequence(),
                });
            }
        }
        validate_sequence(&events)?;

        Ok((snapshot, events))
    }
}

/// Validate that consecutive event sequences differ by exactly one.
pub fn validate_sequence(events: &[Event]) -> Result<(), RecoveryError> {
    for pair in events.windows(2) {
        let prev = pair[0].sequence();
        let curr = pair[1].sequence();
        if curr == prev {
            return Err(RecoveryError::DuplicateSequence(curr));
        }
        if curr < prev {
            return Err(RecoveryError::SequenceRegression { prev, got: curr });
        }
        if curr != prev + 1 {
            return Err(RecoveryError::SequenceGap {
                expected: prev + 1,
                got: curr,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::FileEventStore;
    use crate::snapshot_store::{FileSnapshotStore, SNAPSHOT_VERSION};
    use matching_engine::events::OrderAccepted;
    use matching_engine::OrderBookState;
    use tempfile::TempDir;
    use types::order::{OrderStatus, Side};

    fn accepted(seq: i64) -> Event {
        Event::OrderAccepted(OrderAccepted {
            sequence: seq,
            symbol: "BTC-USDT".into(),
            occurred_at: seq,
            order_id: format!("o{}", seq),
            client_order_id: format!("c{}", seq),
            account_id: "acc-1".into(),
            side: Side::Buy,
            price: 43_000,
            quantity: 100,
            status: OrderStatus::New,
        })
    }

    fn service(tmp: &TempDir) -> (RecoveryService, Arc<FileEventStore>, Arc<FileSnapshotStore>) {
        let events = Arc::new(FileEventStore::open(tmp.path().join("events")).unwrap());
        let snapshots = Arc::new(FileSnapshotStore::open(tmp.path().join("snapshots")).unwrap());
        (
            RecoveryService::new(events.clone(), snapshots.clone()),
            events,
            snapshots,
        )
    }

    #[test]
    fn test_validate_sequence_accepts_dense() {
        let events: Vec<_> = (1..=5).map(accepted).collect();
        assert!(validate_sequence(&events).is_ok());
        assert!(validate_sequence(&[]).is_ok());
    }

    #[test]
    fn test_validate_sequence_detects_gap() {
        let events = vec![accepted(1), accepted(2), accepted(5)];
        assert!(matches!(
            validate_sequence(&events),
            Err(RecoveryError::SequenceGap { expected: 3, got: 5 })
        ));
    }

    #[test]
    fn test_validate_sequence_detects_duplicate_and_regression() {
        assert!(matches!(
            validate_sequence(&[accepted(1), accepted(1)]),
            Err(RecoveryError::DuplicateSequence(1))
        ));
        assert!(matches!(
            validate_sequence(&[accepted(3), accepted(2)]),
            Err(RecoveryError::SequenceRegression { prev: 3, got: 2 })
        ));
    }

    #[test]
    fn test_recover_without_snapshot_reads_from_one() {
        let tmp = TempDir::new().unwrap();
        let (service, events, _) = service(&tmp);
        for seq in 1..=4 {
            events.append("BTC-USDT", &accepted(seq)).unwrap();
        }

        let (snapshot, tail) = service.recover("BTC-USDT").unwrap();
        assert!(snapshot.is_none());
        assert_eq!(tail.len(), 4);
        assert_eq!(tail[0].sequence(), 1);
    }

    #[test]
    fn test_recover_reads_tail_after_snapshot() {
        let tmp = TempDir::new().unwrap();
        let (service, events, snapshots) = service(&tmp);
        for seq in 1..=6 {
            events.append("BTC-USDT", &accepted(seq)).unwrap();
        }
        snapshots
            .save(&Snapshot {
                version: SNAPSHOT_VERSION,
                symbol: "BTC-USDT".into(),
                last_sequence: 3,
                captured_at: 0,
                orderbook: Some(OrderBookState {
                    symbol: "BTC-USDT".into(),
                    event_seq: 3,
                    trade_seq: 0,
                    orders: Vec::new(),
                    closed_orders: Default::default(),
                }),
            })
            .unwrap();

        let (snapshot, tail) = service.recover("BTC-USDT").unwrap();
        assert_eq!(snapshot.unwrap().last_sequence, 3);
        let sequences: Vec<_> = tail.iter().map(Event::sequence).collect();
        assert_eq!(sequences, vec![4, 5, 6]);
    }

    #[test]
    fn test_recover_rejects_start_mismatch() {
        let tmp = TempDir::new().unwrap();
        let (service, events, snapshots) = service(&tmp);
        // Log starts at 5 with a snapshot claiming 2: events 3..4 are lost.
        for seq in 5..=6 {
            events.append("BTC-USDT", &accepted(seq)).unwrap();
        }
        snapshots
            .save(&Snapshot {
                version: SNAPSHOT_VERSION,
                symbol: "BTC-USDT".into(),
                last_sequence: 2,
                captured_at: 0,
                orderbook: None,
            })
            .unwrap();

        assert!(matches!(
            service.recover("BTC-USDT"),
            Err(RecoveryError::StartMismatch { expected: 3, got: 5 })
        ));
    }
}
