//! Append-only per-symbol event log.
//!
//! On-disk format: one directory per symbol under the store root, holding a
//! newline-delimited JSON file `events.log`. Each record carries
//! `{version, symbol, sequence, type, occurred_at, payload}` with the
//! event's own field set as the payload. A record is flushed and fsynced
//! before `append` returns, so an acknowledged event survives a crash.

use matching_engine::events::{Event, OrderAccepted, OrderCanceled, OrderMatched};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Current on-disk record version.
pub const RECORD_VERSION: i32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

/// One persisted event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub version: i32,
    pub symbol: String,
    pub sequence: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: i64,
    /// The event's field set, verbatim.
    pub payload: serde_json::Value,
}

/// Encode a domain event into its log record.
pub fn encode_event(event: &Event) -> Result<EventRecord, StoreError> {
    let payload = match event {
        Event::OrderAccepted(e) => serde_json::to_value(e)?,
        Event::OrderMatched(e) => serde_json::to_value(e)?,
        Event::OrderCanceled(e) => serde_json::to_value(e)?,
    };
    Ok(EventRecord {
        version: RECORD_VERSION,
        symbol: event.symbol().to_string(),
        sequence: event.sequence(),
        event_type: event.event_type().to_string(),
        occurred_at: event.occurred_at(),
        payload,
    })
}

/// Decode a log record back into a domain event.
pub fn decode_event(record: &EventRecord) -> Result<Event, StoreError> {
    let payload = record.payload.clone();
    match record.event_type.as_str() {
        "OrderAccepted" => Ok(Event::OrderAccepted(serde_json::from_value::<OrderAccepted>(
            payload,
        )?)),
        "OrderMatched" => Ok(Event::OrderMatched(serde_json::from_value::<OrderMatched>(
            payload,
        )?)),
        "OrderCanceled" => Ok(Event::OrderCanceled(serde_json::from_value::<OrderCanceled>(
            payload,
        )?)),
        other => Err(StoreError::UnknownEventType(other.to_string())),
    }
}

/// Event log persistence contract.
pub trait EventStore: Send + Sync {
    /// Append one event to the symbol's log; durable before return.
    fn append(&self, symbol: &str, event: &Event) -> Result<(), StoreError>;

    /// Read events with `sequence >= from_seq`, in log order.
    fn read_from(&self, symbol: &str, from_seq: i64) -> Result<Vec<Event>, StoreError>;

    /// Highest sequence in the symbol's log, 0 when empty.
    fn last_sequence(&self, symbol: &str) -> Result<i64, StoreError>;

    /// All symbols that have an event log.
    fn list_symbols(&self) -> Result<Vec<String>, StoreError>;

    /// Release open file handles.
    fn close(&self) -> Result<(), StoreError>;
}

/// JSONL file-backed [`EventStore`].
pub struct FileEventStore {
    base_dir: PathBuf,
    /// symbol → open append handle. Appends are serialized through this lock.
    files: Mutex<HashMap<String, File>>,
}

impl FileEventStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    fn log_path(&self, symbol: &str) -> PathBuf {
        self.base_dir.join(symbol).join("events.log")
    }

    fn open_append(&self, symbol: &str) -> Result<File, StoreError> {
        let symbol_dir = self.base_dir.join(symbol);
        fs::create_dir_all(&symbol_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(symbol_dir.join("events.log"))?;
        Ok(file)
    }

    fn read_records(path: &Path) -> Result<Vec<EventRecord>, StoreError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl EventStore for FileEventStore {
    fn append(&self, symbol: &str, event: &Event) -> Result<(), StoreError> {
        let record = encode_event(event)?;
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        if !files.contains_key(symbol) {
            let file = self.open_append(symbol)?;
            files.insert(symbol.to_string(), file);
        }
        let file = files
            .get_mut(symbol)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "event log handle missing"))?;

        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    fn read_from(&self, symbol: &str, from_seq: i64) -> Result<Vec<Event>, StoreError> {
        let path = self.log_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut events = Vec::new();
        for record in Self::read_records(&path)? {
            if record.sequence < from_seq {
                continue;
            }
            events.push(decode_event(&record)?);
        }
        Ok(events)
    }

    fn last_sequence(&self, symbol: &str) -> Result<i64, StoreError> {
        let path = self.log_path(symbol);
        if !path.exists() {
            return Ok(0);
        }
        let mut last = 0;
        for record in Self::read_records(&path)? {
            if record.sequence > last {
                last = record.sequence;
            }
        }
        Ok(last)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StoreError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.path().join("events.log").exists() {
                symbols.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use types::order::{OrderStatus, Side};

    fn accepted(symbol: &str, seq: i64, order_id: &str) -> Event {
        Event::OrderAccepted(OrderAccepted {
            sequence: seq,
            symbol: symbol.into(),
            occurred_at: 1_700_000_000_000_000_000 + seq,
            order_id: order_id.into(),
            client_order_id: format!("c-{}", order_id),
            account_id: "acc-1".into(),
            side: Side::Buy,
            price: 43_000,
            quantity: 100,
            status: OrderStatus::New,
        })
    }

    #[test]
    fn test_append_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileEventStore::open(tmp.path()).unwrap();

        for seq in 1..=3 {
            store
                .append("BTC-USDT", &accepted("BTC-USDT", seq, &format!("o{}", seq)))
                .unwrap();
        }

        let events = store.read_from("BTC-USDT", 1).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence(), 1);
        assert_eq!(events[2].sequence(), 3);
    }

    #[test]
    fn test_read_from_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        let store = FileEventStore::open(tmp.path()).unwrap();
        for seq in 1..=5 {
            store
                .append("BTC-USDT", &accepted("BTC-USDT", seq, &format!("o{}", seq)))
                .unwrap();
        }

        let events = store.read_from("BTC-USDT", 3).unwrap();
        let sequences: Vec<_> = events.iter().map(Event::sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);
    }

    #[test]
    fn test_read_missing_symbol_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileEventStore::open(tmp.path()).unwrap();
        assert!(store.read_from("ETH-USDT", 1).unwrap().is_empty());
        assert_eq!(store.last_sequence("ETH-USDT").unwrap(), 0);
    }

    #[test]
    fn test_events_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FileEventStore::open(tmp.path()).unwrap();
            store.append("BTC-USDT", &accepted("BTC-USDT", 1, "o1")).unwrap();
            store.close().unwrap();
        }
        let store = FileEventStore::open(tmp.path()).unwrap();
        let events = store.read_from("BTC-USDT", 1).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(store.last_sequence("BTC-USDT").unwrap(), 1);
    }

    #[test]
    fn test_list_symbols() {
        let tmp = TempDir::new().unwrap();
        let store = FileEventStore::open(tmp.path()).unwrap();
        store.append("BTC-USDT", &accepted("BTC-USDT", 1, "o1")).unwrap();
        store.append("ETH-USDT", &accepted("ETH-USDT", 1, "o2")).unwrap();

        assert_eq!(
            store.list_symbols().unwrap(),
            vec!["BTC-USDT".to_string(), "ETH-USDT".to_string()]
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let record = EventRecord {
            version: RECORD_VERSION,
            symbol: "BTC-USDT".into(),
            sequence: 1,
            event_type: "OrderTeleported".into(),
            occurred_at: 0,
            payload: serde_json::Value::Null,
        };
        assert!(matches!(
            decode_event(&record),
            Err(StoreError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_corrupt_line_fails_read() {
        let tmp = TempDir::new().unwrap();
        let store = FileEventStore::open(tmp.path()).unwrap();
        store.append("BTC-USDT", &accepted("BTC-USDT", 1, "o1")).unwrap();

        let path = tmp.path().join("BTC-USDT").join("events.log");
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(b"{not json\n").unwrap();

        assert!(store.read_from("BTC-USDT", 1).is_err());
    }

    #[test]
    fn test_record_wire_format_fields() {
        let event = accepted("BTC-USDT", 7, "o7");
        let record = encode_event(&event).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["symbol"], "BTC-USDT");
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["type"], "OrderAccepted");
        assert_eq!(json["payload"]["order_id"], "o7");
        assert_eq!(json["payload"]["side"], "BUY");

        let decoded = decode_event(&record).unwrap();
        assert_eq!(decoded, event);
    }
}
