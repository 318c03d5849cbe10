//! Identifier derivation for exchange entities.
//!
//! Order ids are deterministic: the same `(account, symbol, idempotency_key)`
//! triple always yields the same id, across retries and across processes.
//! Command ids are random, trade ids are per-book sequential.

use uuid::Uuid;

/// Prefix carried by every server-assigned order id.
pub const ORDER_ID_PREFIX: &str = "ord_";

/// Derive the deterministic order id for a logical request.
///
/// UUID v5 (SHA-1) over the DNS namespace of `account|symbol|idempotency_key`,
/// so recovery after a lost response is safe without any server-side dedup
/// state beyond the idempotency cache.
pub fn order_id_for(account_id: &str, symbol: &str, idempotency_key: &str) -> String {
    let name = format!("{}|{}|{}", account_id, symbol, idempotency_key);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes());
    format!("{}{}", ORDER_ID_PREFIX, id)
}

/// Generate a fresh command id for an envelope.
pub fn command_id() -> String {
    format!("cmd_{}", Uuid::new_v4())
}

/// Format a trade id from a per-book trade sequence number.
pub fn trade_id(trade_seq: i64) -> String {
    format!("trd_{}", trade_seq)
}
