//! Ledger error taxonomy.

use thiserror::Error;
use types::errors::SymbolError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Not enough available balance to freeze. Carries the full context for
    /// diagnosis.
    #[error(
        "insufficient balance: account={account_id} asset={asset} required={required} available={available}"
    )]
    InsufficientBalance {
        account_id: String,
        asset: String,
        required: i64,
        available: i64,
    },

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("invalid amount")]
    InvalidAmount,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("order_id {0} already frozen with different parameters")]
    FreezeConflict(String),

    #[error("account mismatch: freeze belongs to {owner}, release from {requester}")]
    FreezeAccountMismatch { owner: String, requester: String },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Frozen funds would go negative. Indicates corruption; fatal for the
    /// affected operation.
    #[error("frozen balance underflow: account={account_id} asset={asset}")]
    FrozenUnderflow { account_id: String, asset: String },

    /// A per-order freeze record would go negative.
    #[error("freeze record underflow for order {0}")]
    FreezeRecordUnderflow(String),
}
