//! Balance-affecting intents handed to the ledger.

use crate::errors::LedgerError;
use types::numeric::pow10;
use types::order::Side;

/// Intent to reserve funds for a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceIntent {
    pub account_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    /// Fixed-scale price, precision from the symbol spec.
    pub price: i64,
    /// Fixed-scale quantity, precision from the symbol spec.
    pub quantity: i64,
}

impl PlaceIntent {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.account_id.is_empty() {
            return Err(LedgerError::MissingField("account_id"));
        }
        if self.order_id.is_empty() {
            return Err(LedgerError::MissingField("order_id"));
        }
        if self.symbol.is_empty() {
            return Err(LedgerError::MissingField("symbol"));
        }
        if self.price <= 0 || self.quantity <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }
}

/// Intent to release the remaining freeze of a canceled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelIntent {
    pub account_id: String,
    pub order_id: String,
    pub symbol: String,
}

impl CancelIntent {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.account_id.is_empty() {
            return Err(LedgerError::MissingField("account_id"));
        }
        if self.order_id.is_empty() {
            return Err(LedgerError::MissingField("order_id"));
        }
        if self.symbol.is_empty() {
            return Err(LedgerError::MissingField("symbol"));
        }
        Ok(())
    }
}

/// A trade execution that settles buyer against seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub trade_id: String,
    pub buyer_account_id: String,
    pub seller_account_id: String,
    pub buyer_order_id: String,
    pub seller_order_id: String,
    pub symbol: String,
    pub price: i64,
    pub quantity: i64,
}

impl TradeIntent {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.trade_id.is_empty() {
            return Err(LedgerError::MissingField("trade_id"));
        }
        if self.buyer_account_id.is_empty() || self.seller_account_id.is_empty() {
            return Err(LedgerError::MissingField("account_id"));
        }
        if self.buyer_order_id.is_empty() || self.seller_order_id.is_empty() {
            return Err(LedgerError::MissingField("order_id"));
        }
        if self.symbol.is_empty() {
            return Err(LedgerError::MissingField("symbol"));
        }
        if self.price <= 0 || self.quantity <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }
}

/// Quote amount owed for a trade: `ceil(price × qty / 10^quantity_scale)`.
///
/// The product is computed in `i128` so `i64 × i64` can never overflow
/// mid-calculation; the final amount must fit `i64` and be positive.
pub fn quote_amount(price: i64, quantity: i64, quantity_scale: u32) -> Result<i64, LedgerError> {
    if price <= 0 || quantity <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    let denom = pow10(quantity_scale).map_err(|_| LedgerError::InvalidAmount)? as i128;
    let product = price as i128 * quantity as i128;
    let mut amount = product / denom;
    if product % denom > 0 {
        amount += 1;
    }
    if amount <= 0 || amount > i64::MAX as i128 {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(amount as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_amount_exact_division() {
        // 2 × 3 at scale 0.
        assert_eq!(quote_amount(2, 3, 0).unwrap(), 6);
        // price 100, qty 3_000_000 (3 units at scale 6) → 300.
        assert_eq!(quote_amount(100, 3_000_000, 6).unwrap(), 300);
    }

    #[test]
    fn test_quote_amount_rounds_up() {
        // 100 × 3 / 10^6 = 0.0003 → ceil = 1.
        assert_eq!(quote_amount(100, 3, 6).unwrap(), 1);
        // 7 × 3 / 10 = 2.1 → ceil = 3.
        assert_eq!(quote_amount(7, 3, 1).unwrap(), 3);
    }

    #[test]
    fn test_quote_amount_wide_product() {
        // A product beyond i64 still settles correctly through i128.
        let price = 4_000_000_000_000i64;
        let quantity = 5_000_000_000i64;
        // product = 2e22, scale 6 → 2e16.
        assert_eq!(quote_amount(price, quantity, 6).unwrap(), 20_000_000_000_000_000);
    }

    #[test]
    fn test_quote_amount_overflow_rejected() {
        assert_eq!(
            quote_amount(i64::MAX, i64::MAX, 0),
            Err(LedgerError::InvalidAmount)
        );
    }

    #[test]
    fn test_quote_amount_rejects_non_positive() {
        assert_eq!(quote_amount(0, 5, 6), Err(LedgerError::InvalidAmount));
        assert_eq!(quote_amount(5, -1, 6), Err(LedgerError::InvalidAmount));
    }
}
