//! Validation of a proposed sale or purchase against current item state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::Money;
use backoffice_inventory::{InventoryItem, InventoryItemId};

use crate::error::LedgerError;
use crate::transaction::{PaymentStatus, TransactionKind, TransactionRecorded};

/// Input record for `propose_transaction`.
///
/// Quantity and price stay signed here: this is untrusted input, and a
/// negative value must surface as a typed error rather than be coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeTransaction {
    pub kind: TransactionKind,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    /// `None` uses the item's current catalog price.
    pub unit_price: Option<i64>,
    pub payment_status: PaymentStatus,
}

impl ProposeTransaction {
    pub fn sale(item_id: InventoryItemId, quantity: i64) -> Self {
        Self {
            kind: TransactionKind::Sale,
            item_id,
            quantity,
            unit_price: None,
            payment_status: PaymentStatus::Paid,
        }
    }

    pub fn purchase(item_id: InventoryItemId, quantity: i64) -> Self {
        Self {
            kind: TransactionKind::Purchase,
            item_id,
            quantity,
            unit_price: None,
            payment_status: PaymentStatus::Paid,
        }
    }

    pub fn with_unit_price(mut self, unit_price: i64) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn on_credit(mut self) -> Self {
        self.payment_status = PaymentStatus::Credit;
        self
    }

    /// Validate against `item` and build the record to commit.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// 1. item registered and not retired (`ItemNotFound`)
    /// 2. quantity > 0 (`InvalidQuantity`)
    /// 3. unit price >= 0 and total representable (`InvalidPrice`)
    /// 4. sale within stock (`InsufficientStock`); purchase within range (`InvalidQuantity`)
    pub fn evaluate(
        &self,
        item: &InventoryItem,
        occurred_at: DateTime<Utc>,
    ) -> Result<TransactionRecorded, LedgerError> {
        if !item.is_active() || item.id_typed() != self.item_id {
            return Err(LedgerError::ItemNotFound(self.item_id));
        }

        let quantity = u64::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(LedgerError::InvalidQuantity(self.quantity))?;

        let unit_price = match self.unit_price {
            Some(raw) => Money::try_from_signed(raw)
                .map_err(|_| LedgerError::InvalidPrice(format!("{raw} is negative")))?,
            None => item.unit_price(),
        };
        let total = unit_price.checked_mul(quantity).ok_or_else(|| {
            LedgerError::InvalidPrice(format!("{quantity} x {unit_price} overflows"))
        })?;

        match self.kind {
            TransactionKind::Sale if quantity > item.stock() => {
                return Err(LedgerError::InsufficientStock {
                    item_id: self.item_id,
                    requested: quantity,
                    available: item.stock(),
                });
            }
            TransactionKind::Purchase if item.stock().checked_add(quantity).is_none() => {
                return Err(LedgerError::InvalidQuantity(self.quantity));
            }
            _ => {}
        }

        Ok(TransactionRecorded {
            kind: self.kind,
            item_id: self.item_id,
            category: item.category(),
            quantity,
            unit_price,
            total,
            payment_status: self.payment_status,
            reverses: None,
            occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::{Aggregate, AggregateId};
    use backoffice_inventory::{InventoryCommand, ItemCategory, RegisterItem, RetireItem};

    fn item(stock: u64, price: u64) -> InventoryItem {
        let item_id = InventoryItemId::new(AggregateId::new());
        let mut item = InventoryItem::empty(item_id);
        let events = item
            .handle(&InventoryCommand::RegisterItem(RegisterItem {
                item_id,
                name: "Green Beans Arabika 1Kg".to_string(),
                sku: "SKU-1".to_string(),
                category: ItemCategory::Purchase,
                unit_price: Money::new(price),
                opening_stock: stock,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    #[test]
    fn sale_within_stock_captures_price_and_total() {
        let item = item(10, 1000);
        let rec = ProposeTransaction::sale(item.id_typed(), 3)
            .evaluate(&item, Utc::now())
            .unwrap();

        assert_eq!(rec.unit_price, Money::new(1000));
        assert_eq!(rec.total, Money::new(3000));
        assert_eq!(rec.category, ItemCategory::Purchase);
    }

    #[test]
    fn explicit_price_overrides_catalog_price() {
        let item = item(10, 1000);
        let rec = ProposeTransaction::purchase(item.id_typed(), 2)
            .with_unit_price(750)
            .on_credit()
            .evaluate(&item, Utc::now())
            .unwrap();

        assert_eq!(rec.total, Money::new(1500));
        assert_eq!(rec.payment_status, PaymentStatus::Credit);
    }

    #[test]
    fn missing_item_wins_over_every_other_failure() {
        let unknown = InventoryItem::empty(InventoryItemId::new(AggregateId::new()));
        let err = ProposeTransaction::sale(unknown.id_typed(), -5)
            .with_unit_price(-1)
            .evaluate(&unknown, Utc::now())
            .unwrap_err();
        assert_eq!(err, LedgerError::ItemNotFound(unknown.id_typed()));
    }

    #[test]
    fn quantity_is_checked_before_price_and_stock() {
        let item = item(0, 1000);
        let err = ProposeTransaction::sale(item.id_typed(), 0)
            .with_unit_price(-1)
            .evaluate(&item, Utc::now())
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidQuantity(0));
    }

    #[test]
    fn price_is_checked_before_stock() {
        let item = item(0, 1000);
        let err = ProposeTransaction::sale(item.id_typed(), 5)
            .with_unit_price(-1)
            .evaluate(&item, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice(_)));
    }

    #[test]
    fn oversell_reports_requested_and_available() {
        let item = item(7, 1000);
        let err = ProposeTransaction::sale(item.id_typed(), 10)
            .evaluate(&item, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                item_id: item.id_typed(),
                requested: 10,
                available: 7,
            }
        );
    }

    #[test]
    fn overflowing_total_is_an_invalid_price() {
        let item = item(10, u64::MAX);
        let err = ProposeTransaction::sale(item.id_typed(), 2)
            .evaluate(&item, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice(_)));
    }

    #[test]
    fn retired_item_is_not_found() {
        let mut item = item(10, 1000);
        let retire = InventoryCommand::RetireItem(RetireItem {
            item_id: item.id_typed(),
            occurred_at: Utc::now(),
        });
        for e in item.handle(&retire).unwrap() {
            item.apply(&e);
        }

        let err = ProposeTransaction::purchase(item.id_typed(), 1)
            .evaluate(&item, Utc::now())
            .unwrap_err();
        assert_eq!(err, LedgerError::ItemNotFound(item.id_typed()));
    }
}
