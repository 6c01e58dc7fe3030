use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{Entity, Money};
use backoffice_events::Event;
use backoffice_inventory::{AdjustStock, InventoryItemId, ItemCategory, StockReason};

use crate::error::LedgerError;

/// Transaction identifier: the position of the transaction in the journal
/// stream. Assigned at commit time, so ids grow in commit order without gaps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "T{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Sale,
    Purchase,
}

impl TransactionKind {
    pub fn opposite(self) -> Self {
        match self {
            TransactionKind::Sale => TransactionKind::Purchase,
            TransactionKind::Purchase => TransactionKind::Sale,
        }
    }

    pub fn stock_reason(self) -> StockReason {
        match self {
            TransactionKind::Sale => StockReason::Sale,
            TransactionKind::Purchase => StockReason::Purchase,
        }
    }

    /// Signed stock movement for `quantity` units: sales issue, purchases receive.
    pub fn stock_delta(self, quantity: u64) -> Option<i64> {
        let q = i64::try_from(quantity).ok()?;
        Some(match self {
            TransactionKind::Sale => -q,
            TransactionKind::Purchase => q,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Settled in full.
    Paid,
    /// Recorded on account, to be settled later.
    Credit,
}

/// A recorded sale or purchase. Immutable: corrections are new reversing
/// transactions, never edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    item_id: InventoryItemId,
    category: ItemCategory,
    quantity: u64,
    unit_price: Money,
    total: Money,
    payment_status: PaymentStatus,
    reverses: Option<TransactionId>,
    occurred_at: DateTime<Utc>,
}

impl Transaction {
    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn item_id(&self) -> InventoryItemId {
        self.item_id
    }

    /// Item category as it was when the transaction was recorded.
    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Unit price captured at creation; later repricing does not touch it.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn reverses(&self) -> Option<TransactionId> {
        self.reverses
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// The transaction that undoes this one: opposite kind, same item,
    /// quantity and captured price.
    pub fn reversal(&self, payment_status: PaymentStatus, occurred_at: DateTime<Utc>) -> TransactionRecorded {
        TransactionRecorded {
            kind: self.kind.opposite(),
            item_id: self.item_id,
            category: self.category,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total: self.total,
            payment_status,
            reverses: Some(self.id),
            occurred_at,
        }
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Event: TransactionRecorded (journal stream).
///
/// Carries everything but the id; the id is the event's sequence number in
/// the journal stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub kind: TransactionKind,
    pub item_id: InventoryItemId,
    pub category: ItemCategory,
    pub quantity: u64,
    pub unit_price: Money,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub reverses: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionRecorded {
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            item_id: self.item_id,
            category: self.category,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total: self.total,
            payment_status: self.payment_status,
            reverses: self.reverses,
            occurred_at: self.occurred_at,
        }
    }

    /// The stock command that must commit together with this record.
    pub fn stock_adjustment(&self) -> Result<AdjustStock, LedgerError> {
        let delta = self
            .kind
            .stock_delta(self.quantity)
            .ok_or(LedgerError::InvalidQuantity(i64::MAX))?;
        Ok(AdjustStock {
            item_id: self.item_id,
            delta,
            reason: self.kind.stock_reason(),
            occurred_at: self.occurred_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionRecorded(TransactionRecorded),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionRecorded(_) => "ledger.journal.transaction_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionRecorded(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::AggregateId;

    fn recorded(kind: TransactionKind, quantity: u64) -> TransactionRecorded {
        TransactionRecorded {
            kind,
            item_id: InventoryItemId::new(AggregateId::new()),
            category: ItemCategory::Production,
            quantity,
            unit_price: Money::new(1000),
            total: Money::new(1000 * quantity),
            payment_status: PaymentStatus::Paid,
            reverses: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn ids_display_zero_padded() {
        assert_eq!(TransactionId(7).to_string(), "T000007");
        assert_eq!(TransactionId(1_234_567).to_string(), "T1234567");
    }

    #[test]
    fn sale_issues_and_purchase_receives() {
        assert_eq!(recorded(TransactionKind::Sale, 3).stock_adjustment().unwrap().delta, -3);
        assert_eq!(recorded(TransactionKind::Purchase, 5).stock_adjustment().unwrap().delta, 5);
    }

    #[test]
    fn reversal_mirrors_the_original() {
        let tx = recorded(TransactionKind::Sale, 3).into_transaction(TransactionId(1));
        let rev = tx.reversal(PaymentStatus::Credit, Utc::now());

        assert_eq!(rev.kind, TransactionKind::Purchase);
        assert_eq!(rev.quantity, 3);
        assert_eq!(rev.unit_price, tx.unit_price());
        assert_eq!(rev.total, tx.total());
        assert_eq!(rev.reverses, Some(TransactionId(1)));
    }

    #[test]
    fn payload_round_trips_through_json() {
        let event = LedgerEvent::TransactionRecorded(recorded(TransactionKind::Purchase, 2));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["TransactionRecorded"]["kind"], "purchase");
        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
