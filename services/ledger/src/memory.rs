//! In-memory ledger behind a single exclusive lock.
//!
//! Writers (`freeze`, `release`, `apply_trade`) take the write lock; balance
//! reads take the shared lock. Critical sections are O(1) per trade.

use crate::balance::Balance;
use crate::errors::LedgerError;
use crate::intent::{quote_amount, CancelIntent, PlaceIntent, TradeIntent};
use crate::Ledger;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use types::order::Side;
use types::symbol;

/// Frozen funds reserved by one order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FreezeRecord {
    account_id: String,
    asset: String,
    original_frozen: i64,
    remaining_frozen: i64,
}

#[derive(Default)]
struct LedgerState {
    /// account_id → asset → balance
    balances: HashMap<String, HashMap<String, Balance>>,
    /// order_id → freeze record
    freezes: HashMap<String, FreezeRecord>,
    /// `symbol|trade_id` markers for idempotent trade application.
    applied_trades: HashSet<String>,
}

impl LedgerState {
    fn balance_mut(&mut self, account_id: &str, asset: &str) -> &mut Balance {
        self.balances
            .entry(account_id.to_string())
            .or_default()
            .entry(asset.to_string())
            .or_default()
    }

    fn balance(&self, account_id: &str, asset: &str) -> Balance {
        self.balances
            .get(account_id)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or_default()
    }
}

/// In-memory [`Ledger`] implementation.
#[derive(Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve which asset a place intent freezes and how much.
fn freeze_amount_for_place(intent: &PlaceIntent) -> Result<(String, i64), LedgerError> {
    let (base, quote) = symbol::parse_symbol(&intent.symbol)?;
    let spec = symbol::get(&intent.symbol)?;
    match intent.side {
        Side::Buy => {
            let amount = quote_amount(intent.price, intent.quantity, spec.quantity_scale)?;
            Ok((quote.to_string(), amount))
        }
        Side::Sell => Ok((base.to_string(), intent.quantity)),
    }
}

impl Ledger for MemoryLedger {
    fn check_and_freeze_for_place(&self, intent: &PlaceIntent) -> Result<(), LedgerError> {
        intent.validate()?;
        let (asset, amount) = freeze_amount_for_place(intent)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        // Idempotent retry: same order id with the same shape is a no-op.
        if let Some(existing) = state.freezes.get(&intent.order_id) {
            if existing.account_id == intent.account_id
                && existing.asset == asset
                && existing.original_frozen == amount
            {
                return Ok(());
            }
            return Err(LedgerError::FreezeConflict(intent.order_id.clone()));
        }

        let balance = state.balance_mut(&intent.account_id, &asset);
        if balance.available < amount {
            let available = balance.available;
            return Err(LedgerError::InsufficientBalance {
                account_id: intent.account_id.clone(),
                asset,
                required: amount,
                available,
            });
        }
        balance.available -= amount;
        balance.frozen += amount;

        state.freezes.insert(
            intent.order_id.clone(),
            FreezeRecord {
                account_id: intent.account_id.clone(),
                asset,
                original_frozen: amount,
                remaining_frozen: amount,
            },
        );
        Ok(())
    }

    fn release_on_cancel(&self, intent: &CancelIntent) -> Result<(), LedgerError> {
        intent.validate()?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let Some(freeze) = state.freezes.get(&intent.order_id) else {
            // Already fully filled: nothing left to release.
            return Ok(());
        };
        if freeze.account_id != intent.account_id {
            return Err(LedgerError::FreezeAccountMismatch {
                owner: freeze.account_id.clone(),
                requester: intent.account_id.clone(),
            });
        }
        let (account_id, asset, remaining) = (
            freeze.account_id.clone(),
            freeze.asset.clone(),
            freeze.remaining_frozen,
        );
        if remaining <= 0 {
            return Ok(());
        }

        if !state.balances.contains_key(&account_id) {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        let balance = state.balance_mut(&account_id, &asset);
        if balance.frozen < remaining {
            return Err(LedgerError::FrozenUnderflow { account_id, asset });
        }
        balance.frozen -= remaining;
        balance.available += remaining;

        if let Some(freeze) = state.freezes.get_mut(&intent.order_id) {
            freeze.remaining_frozen = 0;
        }
        Ok(())
    }

    fn apply_trade(&self, intent: &TradeIntent) -> Result<(), LedgerError> {
        intent.validate()?;
        let (base, quote) = symbol::parse_symbol(&intent.symbol)?;
        let spec = symbol::get(&intent.symbol)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let trade_key = format!("{}|{}", intent.symbol, intent.trade_id);
        if state.applied_trades.contains(&trade_key) {
            return Ok(());
        }

        let quote_qty = quote_amount(intent.price, intent.quantity, spec.quantity_scale)?;
        let base_qty = intent.quantity;

        // Verify every decrement before touching anything, so a failed trade
        // leaves no partial settlement behind.
        if state.balance(&intent.buyer_account_id, quote).frozen < quote_qty {
            return Err(LedgerError::FrozenUnderflow {
                account_id: intent.buyer_account_id.clone(),
                asset: quote.to_string(),
            });
        }
        if state.balance(&intent.seller_account_id, base).frozen < base_qty {
            return Err(LedgerError::FrozenUnderflow {
                account_id: intent.seller_account_id.clone(),
                asset: base.to_string(),
            });
        }
        if let Some(freeze) = state.freezes.get(&intent.buyer_order_id) {
            if freeze.remaining_frozen < quote_qty {
                return Err(LedgerError::FreezeRecordUnderflow(
                    intent.buyer_order_id.clone(),
                ));
            }
        }
        if let Some(freeze) = state.freezes.get(&intent.seller_order_id) {
            if freeze.remaining_frozen < base_qty {
                return Err(LedgerError::FreezeRecordUnderflow(
                    intent.seller_order_id.clone(),
                ));
            }
        }

        // Buyer pays frozen QUOTE, receives BASE.
        {
            let buyer_quote = state.balance_mut(&intent.buyer_account_id, quote);
            buyer_quote.frozen -= quote_qty;
        }
        {
            let buyer_base = state.balance_mut(&intent.buyer_account_id, base);
            buyer_base.available += base_qty;
        }
        // Seller pays frozen BASE, receives QUOTE.
        {
            let seller_base = state.balance_mut(&intent.seller_account_id, base);
            seller_base.frozen -= base_qty;
        }
        {
            let seller_quote = state.balance_mut(&intent.seller_account_id, quote);
            seller_quote.available += quote_qty;
        }

        // Keep per-order freeze trackers accurate for a later cancel release.
        if let Some(freeze) = state.freezes.get_mut(&intent.buyer_order_id) {
            freeze.remaining_frozen -= quote_qty;
        }
        if let Some(freeze) = state.freezes.get_mut(&intent.seller_order_id) {
            freeze.remaining_frozen -= base_qty;
        }

        state.applied_trades.insert(trade_key);
        Ok(())
    }

    fn balance(&self, account_id: &str, asset: &str) -> Result<Balance, LedgerError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.balance(account_id, asset))
    }

    fn set_balance(
        &self,
        account_id: &str,
        asset: &str,
        balance: Balance,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state.balance_mut(account_id, asset) = balance;
        Ok(())
    }
}
