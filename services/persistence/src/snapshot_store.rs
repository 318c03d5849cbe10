//! Per-symbol versioned snapshots.
//!
//! Each snapshot is a single JSON file `snapshot-<last_sequence>.json`
//! inside the symbol's directory, written to a temp file, fsynced, then
//! atomically renamed into place. Loading picks the snapshot with the
//! highest `last_sequence` (latest wins); concurrent readers see either the
//! old file or the new one, never a torn write.

use crate::event_store::StoreError;
use matching_engine::OrderBookState;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: i32 = 1;

/// A point-in-time capture of one symbol's book state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: i32,
    pub symbol: String,
    /// Sequence of the last event reflected in `orderbook`.
    pub last_sequence: i64,
    /// Unix nanos, observational.
    pub captured_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderbook: Option<OrderBookState>,
}

/// Snapshot listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub symbol: String,
    pub last_sequence: i64,
    /// File modification time in Unix nanos.
    pub captured_at: i64,
    pub file_path: PathBuf,
}

/// Snapshot persistence contract.
pub trait SnapshotStore: Send + Sync {
    /// Write a snapshot atomically.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Load the snapshot with the highest `last_sequence`, if any.
    fn load(&self, symbol: &str) -> Result<Option<Snapshot>, StoreError>;

    /// List available snapshots, sorted by `last_sequence` descending.
    fn list(&self, symbol: &str) -> Result<Vec<SnapshotMetadata>, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

/// JSON file-backed [`SnapshotStore`].
pub struct FileSnapshotStore {
    base_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn list_internal(&self, symbol: &str) -> Result<Vec<SnapshotMetadata>, StoreError> {
        let symbol_dir = self.base_dir.join(symbol);
        if !symbol_dir.exists() {
            return Ok(Vec::new());
        }
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&symbol_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(seq) = parse_sequence(&name) else {
                continue;
            };
            let captured_at = entry
                .metadata()?
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as i64)
                .unwrap_or(0);
            snapshots.push(SnapshotMetadata {
                symbol: symbol.to_string(),
                last_sequence: seq,
                captured_at,
                file_path: symbol_dir.join(&name),
            });
        }
        snapshots.sort_by(|a, b| b.last_sequence.cmp(&a.last_sequence));
        Ok(snapshots)
    }
}

fn parse_sequence(filename: &str) -> Option<i64> {
    filename
        .strip_prefix("snapshot-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn snapshot_path(dir: &Path, last_sequence: i64) -> PathBuf {
    dir.join(format!("snapshot-{}.json", last_sequence))
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let symbol_dir = self.base_dir.join(&snapshot.symbol);
        fs::create_dir_all(&symbol_dir)?;

        let path = snapshot_path(&symbol_dir, snapshot.last_sequence);
        let tmp_path = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(snapshot)?;

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn load(&self, symbol: &str) -> Result<Option<Snapshot>, StoreError> {
        let snapshots = self.list_internal(symbol)?;
        let Some(latest) = snapshots.first() else {
            return Ok(None);
        };
        let data = fs::read(&latest.file_path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn list(&self, symbol: &str) -> Result<Vec<SnapshotMetadata>, StoreError> {
        self.list_internal(symbol)
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
