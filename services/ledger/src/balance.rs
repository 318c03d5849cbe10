//! Account balance for a single asset.

use serde::{Deserialize, Serialize};

/// Balance components in scaled integer units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Spendable by new orders.
    pub available: i64,
    /// Locked by active orders.
    pub frozen: i64,
}

impl Balance {
    pub fn new(available: i64, frozen: i64) -> Self {
        Self { available, frozen }
    }

    pub fn total(&self) -> i64 {
        self.available + self.frozen
    }
}
