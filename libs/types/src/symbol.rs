//! Per-symbol precision and step constraints.
//!
//! Every externally supplied price or quantity must be a multiple of the
//! symbol's tick / step and fit `i64` after scaling.

use crate::errors::SymbolError;

/// Precision and step constraints for a trading symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpec {
    pub symbol: &'static str,
    /// Decimal places carried by scaled prices.
    pub price_scale: u32,
    /// Decimal places carried by scaled quantities.
    pub quantity_scale: u32,
    /// Minimum price increment, in scaled units.
    pub price_tick: i64,
    /// Minimum quantity increment, in scaled units.
    pub qty_step: i64,
}

const SPECS: &[SymbolSpec] = &[
    SymbolSpec {
        symbol: "BTC-USDT",
        price_scale: 6,
        quantity_scale: 6,
        price_tick: 1,
        qty_step: 1,
    },
    SymbolSpec {
        symbol: "ETH-USDT",
        price_scale: 6,
        quantity_scale: 6,
        price_tick: 1,
        qty_step: 1,
    },
    SymbolSpec {
        symbol: "SOL-USDT",
        price_scale: 6,
        quantity_scale: 6,
        price_tick: 1,
        qty_step: 1,
    },
];

/// Look up the spec for a symbol.
///
/// Lookup is case-insensitive and trims surrounding whitespace.
pub fn get(symbol: &str) -> Result<&'static SymbolSpec, SymbolError> {
    let normalized = symbol.trim().to_ascii_uppercase();
    SPECS
        .iter()
        .find(|s| s.symbol == normalized)
        .ok_or_else(|| SymbolError::Unsupported(symbol.to_string()))
}

/// All supported symbols, in registry order.
pub fn supported_symbols() -> impl Iterator<Item = &'static str> {
    SPECS.iter().map(|s| s.symbol)
}

/// Split a symbol like `BTC-USDT` into its base and quote assets.
pub fn parse_symbol(symbol: &str) -> Result<(&str, &str), SymbolError> {
    match symbol.split_once('-') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('-') => {
            Ok((base, quote))
        }
        _ => Err(SymbolError::InvalidFormat(symbol.to_string())),
    }
}
