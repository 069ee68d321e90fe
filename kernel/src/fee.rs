// Parking Fee Rule
//
// A flat rate per started billing block, with a one-block minimum.

use serde::{Deserialize, Serialize};

/// Monetary amount in whole rupiah.
pub type Amount = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_rate: Amount,
    pub block_minutes: u64,
}

impl FeeSchedule {
    /// Cost of a stay of `minutes` whole minutes.
    ///
    /// Zero-minute stays are still charged one block.
    pub fn cost_for(&self, minutes: u64) -> Amount {
        let blocks = minutes.div_ceil(self.block_minutes.max(1)).max(1);
        self.base_rate.saturating_mul(blocks)
    }
}

/// Render an amount the way receipts show it, e.g. `Rp 6.000`.
pub fn format_rupiah(amount: Amount) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    format!("Rp {grouped}")
}
