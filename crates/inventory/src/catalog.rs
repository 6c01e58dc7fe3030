//! SKU registry.
//!
//! SKU uniqueness spans every item, so it cannot be decided inside a single
//! item stream. The catalog is a second aggregate with one well-known stream;
//! registering an item appends to both streams in one atomic write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use backoffice_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use backoffice_events::Event;

use crate::item::InventoryItemId;

/// Stream id of the single catalog aggregate.
pub const CATALOG_STREAM_ID: AggregateId =
    AggregateId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_00ca_7a10_0001));

/// Canonical SKU form: trimmed, upper-case.
pub fn normalize_sku(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Aggregate root: Catalog (SKU -> item).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    id: AggregateId,
    skus: HashMap<String, InventoryItemId>,
    version: u64,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            id: CATALOG_STREAM_ID,
            skus: HashMap::new(),
            version: 0,
        }
    }

    /// Look up the item holding a SKU (any casing/whitespace).
    pub fn item_for_sku(&self, sku: &str) -> Option<InventoryItemId> {
        self.skus.get(&normalize_sku(sku)).copied()
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

impl AggregateRoot for Catalog {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ClaimSku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSku {
    pub sku: String,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogCommand {
    ClaimSku(ClaimSku),
}

/// Event: SkuClaimed. SKUs stay claimed after their item is retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuClaimed {
    pub sku: String,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    SkuClaimed(SkuClaimed),
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::SkuClaimed(_) => "inventory.catalog.sku_claimed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::SkuClaimed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Catalog {
    type Command = CatalogCommand;
    type Event = CatalogEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CatalogEvent::SkuClaimed(e) => {
                self.skus.insert(e.sku.clone(), e.item_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CatalogCommand::ClaimSku(cmd) => {
                let sku = normalize_sku(&cmd.sku);
                if sku.is_empty() {
                    return Err(DomainError::validation("sku cannot be empty"));
                }
                if self.skus.contains_key(&sku) {
                    return Err(DomainError::conflict(format!("sku '{sku}' already registered")));
                }
                Ok(vec![CatalogEvent::SkuClaimed(SkuClaimed {
                    sku,
                    item_id: cmd.item_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(catalog: &Catalog, sku: &str) -> Result<Vec<CatalogEvent>, DomainError> {
        catalog.handle(&CatalogCommand::ClaimSku(ClaimSku {
            sku: sku.to_string(),
            item_id: InventoryItemId::new(AggregateId::new()),
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn duplicate_sku_is_rejected_regardless_of_casing() {
        let mut catalog = Catalog::empty();
        for e in claim(&catalog, "GROUND-ARB-250G-FR").unwrap() {
            catalog.apply(&e);
        }

        let err = claim(&catalog, "  ground-arb-250g-fr").unwrap_err();
        assert!(matches!(err, DomainError::Conflict(msg) if msg.contains("GROUND-ARB-250G-FR")));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.version(), 1);
    }

    #[test]
    fn lookup_uses_normalized_form() {
        let mut catalog = Catalog::empty();
        let events = claim(&catalog, "sku-1").unwrap();
        let CatalogEvent::SkuClaimed(claimed) = &events[0];
        let item_id = claimed.item_id;
        catalog.apply(&events[0]);

        assert_eq!(catalog.item_for_sku("SKU-1 "), Some(item_id));
        assert_eq!(catalog.item_for_sku("SKU-2"), None);
    }

    #[test]
    fn blank_sku_is_rejected() {
        assert!(matches!(claim(&Catalog::empty(), "  ").unwrap_err(), DomainError::Validation(_)));
    }
}
