//! Persistence plane: event log, snapshots, recovery.
//!
//! Per symbol, an append-only JSONL event log (durable before ack) and
//! versioned point-in-time snapshots (`snapshot-<last_sequence>.json`,
//! atomically renamed into place, latest wins). Recovery stitches the two
//! back together and validates sequence continuity before any replay.

pub mod event_store;
pub mod recovery;
pub mod snapshot_store;

pub use event_store::{EventStore, FileEventStore, StoreError};
pub use recovery::{RecoveryError, RecoveryService};
pub use snapshot_store::{FileSnapshotStore, Snapshot, SnapshotMetadata, SnapshotStore};
