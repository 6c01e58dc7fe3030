use serde::{Deserialize, Serialize};

use crate::transaction::{Transaction, TransactionKind};

/// Totals derived from the journal. Never stored; rebuilt from transactions.
///
/// Amounts are in the smallest currency unit. A single transaction total fits
/// in `u64`; the sums are kept in `u128` so they stay exact for any journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAggregates {
    pub total_sales: u128,
    pub total_purchases: u128,
    pub sale_count: u64,
    pub purchase_count: u64,
}

impl LedgerAggregates {
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut agg = Self::default();
        for tx in transactions {
            agg.record(tx);
        }
        agg
    }

    pub fn record(&mut self, tx: &Transaction) {
        match tx.kind() {
            TransactionKind::Sale => {
                self.total_sales += u128::from(tx.total().amount());
                self.sale_count += 1;
            }
            TransactionKind::Purchase => {
                self.total_purchases += u128::from(tx.total().amount());
                self.purchase_count += 1;
            }
        }
    }

    /// Sales minus purchases (negative when buying outpaces selling).
    pub fn net(&self) -> i128 {
        sign(self.total_sales) - sign(self.total_purchases)
    }
}

/// Reaching `i128::MAX` takes more than 2^63 transactions at `u64::MAX` each.
fn sign(amount: u128) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}
