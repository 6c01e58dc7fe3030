use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_inventory::{InventoryItemId, ItemCategory};

use crate::transaction::{PaymentStatus, Transaction, TransactionKind};

/// Optional predicates for listing transactions. Unset fields match anything;
/// set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<ItemCategory>,
    pub item_id: Option<InventoryItemId>,
    pub payment_status: Option<PaymentStatus>,
    /// Inclusive lower bound on `occurred_at`.
    pub occurred_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `occurred_at`.
    pub occurred_until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category: ItemCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn item(mut self, item_id: InventoryItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.occurred_from = Some(from);
        self.occurred_until = Some(until);
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.kind.is_none_or(|k| tx.kind() == k)
            && self.category.is_none_or(|c| tx.category() == c)
            && self.item_id.is_none_or(|i| tx.item_id() == i)
            && self.payment_status.is_none_or(|p| tx.payment_status() == p)
            && self.occurred_from.is_none_or(|from| tx.occurred_at() >= from)
            && self.occurred_until.is_none_or(|until| tx.occurred_at() < until)
    }
}
