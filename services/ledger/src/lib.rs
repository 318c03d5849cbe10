//! Account Ledger Service
//!
//! Tracks `(available, frozen)` balances per account and asset, in scaled
//! integers. Placing an order freezes funds, canceling releases the
//! remaining freeze, and each trade settles both parties atomically.
//! Trade application is idempotent by `(symbol, trade_id)`.
//!
//! **Key Invariants:**
//! - No balance component ever goes negative
//! - `available + frozen` is conserved across a freeze/release pair
//! - A trade conserves total BASE and total QUOTE across buyer + seller

pub mod balance;
pub mod errors;
pub mod intent;
pub mod memory;

pub use balance::Balance;
pub use errors::LedgerError;
pub use intent::{CancelIntent, PlaceIntent, TradeIntent};
pub use memory::MemoryLedger;

/// The ledger contract consumed by the gateway and recovery.
pub trait Ledger: Send + Sync {
    /// Check balance and freeze funds for placing an order.
    ///
    /// BUY freezes the quote asset (`ceil(price × qty / 10^quantity_scale)`),
    /// SELL freezes the base asset (`qty`). Re-submission with the same
    /// order id and identical parameters is an idempotent no-op.
    fn check_and_freeze_for_place(&self, intent: &PlaceIntent) -> Result<(), LedgerError>;

    /// Release the remaining frozen funds of a canceled order.
    ///
    /// A missing freeze record is not an error: the order may have fully
    /// filled already.
    fn release_on_cancel(&self, intent: &CancelIntent) -> Result<(), LedgerError>;

    /// Apply the balance effects of a trade to buyer and seller.
    ///
    /// Idempotent by `(symbol, trade_id)`: the second application is a
    /// no-op.
    fn apply_trade(&self, intent: &TradeIntent) -> Result<(), LedgerError>;

    /// Current balance for an account and asset (zero if never touched).
    fn balance(&self, account_id: &str, asset: &str) -> Result<Balance, LedgerError>;

    /// Overwrite a balance (bootstrap and tests).
    fn set_balance(&self, account_id: &str, asset: &str, balance: Balance)
        -> Result<(), LedgerError>;
}
