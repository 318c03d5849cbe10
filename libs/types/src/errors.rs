//! Error taxonomy for numeric parsing and symbol resolution.

use thiserror::Error;

/// Errors produced by fixed-point decimal parsing and arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("empty value")]
    Empty,

    #[error("value must be positive")]
    NonPositive,

    #[error("invalid decimal format")]
    InvalidFormat,

    #[error("invalid digits")]
    InvalidDigits,

    #[error("too many decimal places: max {max}")]
    TooManyDecimals { max: u32 },

    #[error("value overflow")]
    Overflow,

    #[error("scale out of range: {scale}")]
    InvalidScale { scale: u32 },
}

/// Errors produced by the symbol spec registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("unsupported symbol: {0}")]
    Unsupported(String),

    #[error("invalid symbol format: {0}")]
    InvalidFormat(String),
}
