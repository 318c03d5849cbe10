//! Types library for the spot matching engine
//!
//! This library provides the core type definitions shared across the engine:
//! fixed-point scaled integers, the symbol spec registry, order/trade
//! primitives, and id derivation.
//!
//! # Modules
//! - `ids`: Identifier derivation (deterministic order ids, command ids)
//! - `numeric`: Fixed-point scaled integer parsing and formatting
//! - `symbol`: Per-symbol precision and step constraints
//! - `order`: Order lifecycle types and command requests
//! - `trade`: Trade execution types
//! - `errors`: Error taxonomy for numeric and symbol handling

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod symbol;
pub mod trade;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix nanoseconds.
///
/// Timestamps are observational: event sequences, not clocks, decide
/// ordering.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
