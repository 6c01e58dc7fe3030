use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money};
use backoffice_events::Event;

use crate::catalog::normalize_sku;

/// Inventory item identifier (one event stream per item).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Where an item comes from: roasted in-house or bought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Production,
    Purchase,
}

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockReason {
    Sale,
    Purchase,
}

/// Aggregate root: InventoryItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    name: String,
    sku: String,
    category: ItemCategory,
    unit_price: Money,
    stock: u64,
    retired: bool,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            name: String::new(),
            sku: String::new(),
            category: ItemCategory::Production,
            unit_price: Money::ZERO,
            stock: 0,
            retired: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn stock(&self) -> u64 {
        self.stock
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Registered and not soft-deleted: the only state in which stock may move.
    pub fn is_active(&self) -> bool {
        self.created && !self.retired
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: String,
    pub category: ItemCategory,
    pub unit_price: Money,
    pub opening_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameItem {
    pub item_id: InventoryItemId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RepriceItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepriceItem {
    pub item_id: InventoryItemId,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireItem (soft delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireItem {
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RegisterItem(RegisterItem),
    RenameItem(RenameItem),
    RepriceItem(RepriceItem),
    RetireItem(RetireItem),
    AdjustStock(AdjustStock),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: String,
    pub category: ItemCategory,
    pub unit_price: Money,
    pub opening_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRenamed {
    pub item_id: InventoryItemId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRepriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRepriced {
    pub item_id: InventoryItemId,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRetired {
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    ItemRenamed(ItemRenamed),
    ItemRepriced(ItemRepriced),
    ItemRetired(ItemRetired),
    StockAdjusted(StockAdjusted),
}

impl InventoryEvent {
    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::ItemRegistered(e) => e.item_id,
            InventoryEvent::ItemRenamed(e) => e.item_id,
            InventoryEvent::ItemRepriced(e) => e.item_id,
            InventoryEvent::ItemRetired(e) => e.item_id,
            InventoryEvent::StockAdjusted(e) => e.item_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::ItemRenamed(_) => "inventory.item.renamed",
            InventoryEvent::ItemRepriced(_) => "inventory.item.repriced",
            InventoryEvent::ItemRetired(_) => "inventory.item.retired",
            InventoryEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::ItemRenamed(e) => e.occurred_at,
            InventoryEvent::ItemRepriced(e) => e.occurred_at,
            InventoryEvent::ItemRetired(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.name = e.name.clone();
                self.sku = e.sku.clone();
                self.category = e.category;
                self.unit_price = e.unit_price;
                self.stock = e.opening_stock;
                self.created = true;
            }
            InventoryEvent::ItemRenamed(e) => {
                self.name = e.name.clone();
            }
            InventoryEvent::ItemRepriced(e) => {
                self.unit_price = e.unit_price;
            }
            InventoryEvent::ItemRetired(_) => {
                self.retired = true;
            }
            InventoryEvent::StockAdjusted(e) => {
                self.stock = self.stock.saturating_add_signed(e.delta);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RegisterItem(cmd) => self.handle_register(cmd),
            InventoryCommand::RenameItem(cmd) => self.handle_rename(cmd),
            InventoryCommand::RepriceItem(cmd) => self.handle_reprice(cmd),
            InventoryCommand::RetireItem(cmd) => self.handle_retire(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    /// Retired items behave as absent for every mutation.
    fn ensure_active(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::not_found());
        }
        self.ensure_item_id(item_id)
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        self.ensure_item_id(cmd.item_id)?;

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let sku = normalize_sku(&cmd.sku);
        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }

        Ok(vec![InventoryEvent::ItemRegistered(ItemRegistered {
            item_id: cmd.item_id,
            name: name.to_string(),
            sku,
            category: cmd.category,
            unit_price: cmd.unit_price,
            opening_stock: cmd.opening_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_active(cmd.item_id)?;

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name == self.name {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ItemRenamed(ItemRenamed {
            item_id: cmd.item_id,
            name: name.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reprice(&self, cmd: &RepriceItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_active(cmd.item_id)?;

        if cmd.unit_price == self.unit_price {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ItemRepriced(ItemRepriced {
            item_id: cmd.item_id,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_item_id(cmd.item_id)?;
        if self.retired {
            return Err(DomainError::conflict("item already retired"));
        }

        Ok(vec![InventoryEvent::ItemRetired(ItemRetired {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_active(cmd.item_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        if self.stock.checked_add_signed(cmd.delta).is_none() {
            return Err(if cmd.delta < 0 {
                DomainError::invariant("stock cannot go negative")
            } else {
                DomainError::validation("stock overflow")
            });
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            item_id: cmd.item_id,
            delta: cmd.delta,
            reason: cmd.reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}
