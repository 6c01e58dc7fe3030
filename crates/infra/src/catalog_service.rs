//! Catalog management: item registration and metadata.
//!
//! Stock is set once, at registration. Afterwards only the ledger moves it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion, Money};
use backoffice_inventory::{
    CATALOG_STREAM_ID, Catalog, CatalogCommand, ClaimSku, InventoryCommand, InventoryEvent, InventoryItem,
    InventoryItemId, ItemCategory, RegisterItem, RenameItem, RepriceItem, RetireItem, normalize_sku,
};

use crate::clock::{Clock, SystemClock};
use crate::command_dispatcher::{CommandDispatcher, DispatchError, encode_events};
use crate::config::LedgerConfig;
use crate::event_store::{EventStore, StreamAppend};
use crate::projections::stock_levels::StockLevel;
use crate::retry::{Attempt, PersistenceError, commit_with_retry};
use crate::streams;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("inventory item {0} not found")]
    ItemNotFound(InventoryItemId),

    #[error("sku '{0}' is already registered")]
    DuplicateSku(String),

    #[error("no item with sku '{0}'")]
    SkuNotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("inventory item {0} is already retired")]
    AlreadyRetired(InventoryItemId),

    #[error("gave up after {attempts} conflicting commit attempts")]
    Contention { attempts: u32 },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl PersistenceError for CatalogError {
    fn persistence(message: String) -> Self {
        CatalogError::PersistenceFailure(message)
    }
}

impl From<CatalogError> for Attempt<CatalogError> {
    fn from(value: CatalogError) -> Self {
        Attempt::Failed(value)
    }
}

/// Input record for [`CatalogService::register_item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub sku: String,
    pub category: ItemCategory,
    /// Raw price in the smallest currency unit; negative values are rejected.
    pub unit_price: i64,
    pub opening_stock: u64,
}

#[derive(Debug)]
pub struct CatalogService<S, C = SystemClock> {
    dispatcher: CommandDispatcher<S>,
    clock: C,
    config: LedgerConfig,
}

impl<S> CatalogService<S, SystemClock>
where
    S: EventStore,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::with_clock(store, SystemClock, config)
    }
}

impl<S, C> CatalogService<S, C>
where
    S: EventStore,
    C: Clock,
{
    pub fn with_clock(store: S, clock: C, config: LedgerConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store),
            clock,
            config,
        }
    }

    /// Register an item and claim its SKU in one commit.
    pub fn register_item(&self, new_item: NewItem) -> Result<InventoryItem, CatalogError> {
        let unit_price = Money::try_from_signed(new_item.unit_price)
            .map_err(|_| CatalogError::Validation(format!("unit price {} is negative", new_item.unit_price)))?;
        let item_id = InventoryItemId::new(AggregateId::new());

        let item = commit_with_retry(
            "register_item",
            self.config.max_commit_attempts,
            || self.try_register(item_id, &new_item, unit_price),
            |attempts| CatalogError::Contention { attempts },
        )?;

        tracing::info!(item_id = %item_id, sku = %item.sku(), opening_stock = item.stock(), "item registered");
        Ok(item)
    }

    pub fn rename_item(&self, item_id: InventoryItemId, name: impl Into<String>) -> Result<InventoryItem, CatalogError> {
        let name = name.into();
        self.update_item("rename_item", item_id, |_, occurred_at| {
            Ok(InventoryCommand::RenameItem(RenameItem {
                item_id,
                name: name.clone(),
                occurred_at,
            }))
        })
    }

    /// Change the catalog price. Recorded transactions keep their captured price.
    pub fn reprice_item(&self, item_id: InventoryItemId, unit_price: i64) -> Result<InventoryItem, CatalogError> {
        let unit_price = Money::try_from_signed(unit_price)
            .map_err(|_| CatalogError::Validation(format!("unit price {unit_price} is negative")))?;
        self.update_item("reprice_item", item_id, |_, occurred_at| {
            Ok(InventoryCommand::RepriceItem(RepriceItem {
                item_id,
                unit_price,
                occurred_at,
            }))
        })
    }

    /// Soft delete: the item stays readable, its history intact, but takes no
    /// further transactions.
    pub fn retire_item(&self, item_id: InventoryItemId) -> Result<InventoryItem, CatalogError> {
        self.update_item("retire_item", item_id, |item, occurred_at| {
            if item.is_retired() {
                return Err(CatalogError::AlreadyRetired(item_id));
            }
            Ok(InventoryCommand::RetireItem(RetireItem { item_id, occurred_at }))
        })
    }

    /// A registered item, retired or not.
    pub fn get_item(&self, item_id: InventoryItemId) -> Result<InventoryItem, CatalogError> {
        let item = self.load_item(item_id).map_err(|e| match e {
            Attempt::Failed(err) => err,
            Attempt::Conflict(msg) => CatalogError::PersistenceFailure(msg),
        })?;
        if !item.is_registered() {
            return Err(CatalogError::ItemNotFound(item_id));
        }
        Ok(item)
    }

    pub fn find_by_sku(&self, sku: &str) -> Result<InventoryItem, CatalogError> {
        let catalog: Catalog = self
            .dispatcher
            .load(CATALOG_STREAM_ID, streams::INVENTORY_CATALOG, Catalog::empty)
            .map_err(|e| CatalogError::PersistenceFailure(e.to_string()))?;
        let item_id = catalog
            .item_for_sku(sku)
            .ok_or_else(|| CatalogError::SkuNotFound(normalize_sku(sku)))?;
        self.get_item(item_id)
    }

    /// Active items, sorted by name then SKU, from one consistent snapshot.
    pub fn list_items(&self) -> Result<Vec<InventoryItem>, CatalogError> {
        let mut items: Vec<InventoryItem> = self.snapshot()?.into_iter().filter(|i| i.is_active()).collect();
        items.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.sku().cmp(b.sku())));
        Ok(items)
    }

    /// Stock level and status of every active item, in `list_items` order.
    pub fn stock_levels(&self) -> Result<Vec<StockLevel>, CatalogError> {
        Ok(self
            .list_items()?
            .iter()
            .map(|item| StockLevel::of(item, self.config.low_stock_threshold))
            .collect())
    }

    /// Fold every committed item event into item states.
    fn snapshot(&self) -> Result<Vec<InventoryItem>, CatalogError> {
        let events = self
            .dispatcher
            .store()
            .read_all(0)
            .map_err(|e| CatalogError::PersistenceFailure(e.to_string()))?;

        let mut items: HashMap<AggregateId, InventoryItem> = HashMap::new();
        for stored in events.into_iter().filter(|e| e.aggregate_type == streams::INVENTORY_ITEM) {
            let event: InventoryEvent = serde_json::from_value(stored.payload)
                .map_err(|e| CatalogError::PersistenceFailure(format!("failed to deserialize item event: {e}")))?;
            let item_id = InventoryItemId::new(stored.aggregate_id);
            items
                .entry(stored.aggregate_id)
                .or_insert_with(|| InventoryItem::empty(item_id))
                .apply(&event);
        }

        Ok(items.into_values().filter(|i| i.is_registered()).collect())
    }

    fn load_item(&self, item_id: InventoryItemId) -> Result<InventoryItem, Attempt<CatalogError>> {
        match self
            .dispatcher
            .load(item_id.0, streams::INVENTORY_ITEM, || InventoryItem::empty(item_id))
        {
            Ok(item) => Ok(item),
            Err(DispatchError::NotFound) => Err(CatalogError::ItemNotFound(item_id).into()),
            Err(other) => Err(other.into()),
        }
    }

    fn try_register(
        &self,
        item_id: InventoryItemId,
        new_item: &NewItem,
        unit_price: Money,
    ) -> Result<InventoryItem, Attempt<CatalogError>> {
        let occurred_at = self.clock.now();
        let catalog: Catalog = self
            .dispatcher
            .load(CATALOG_STREAM_ID, streams::INVENTORY_CATALOG, Catalog::empty)?;

        let mut item = InventoryItem::empty(item_id);
        let item_events = item
            .handle(&InventoryCommand::RegisterItem(RegisterItem {
                item_id,
                name: new_item.name.clone(),
                sku: new_item.sku.clone(),
                category: new_item.category,
                unit_price,
                opening_stock: new_item.opening_stock,
                occurred_at,
            }))
            .map_err(|e| catalog_error(item_id, e))?;

        let catalog_events = catalog
            .handle(&CatalogCommand::ClaimSku(ClaimSku {
                sku: new_item.sku.clone(),
                item_id,
                occurred_at,
            }))
            .map_err(|e| match e {
                DomainError::Conflict(_) => CatalogError::DuplicateSku(normalize_sku(&new_item.sku)),
                other => catalog_error(item_id, other),
            })?;

        self.dispatcher.store().append_streams(vec![
            StreamAppend::new(
                CATALOG_STREAM_ID,
                ExpectedVersion::Exact(catalog.version()),
                encode_events(CATALOG_STREAM_ID, streams::INVENTORY_CATALOG, &catalog_events)?,
            ),
            StreamAppend::new(
                item_id.0,
                ExpectedVersion::Exact(0),
                encode_events(item_id.0, streams::INVENTORY_ITEM, &item_events)?,
            ),
        ])?;

        for e in &item_events {
            item.apply(e);
        }
        Ok(item)
    }

    fn update_item(
        &self,
        operation: &'static str,
        item_id: InventoryItemId,
        command: impl Fn(&InventoryItem, DateTime<Utc>) -> Result<InventoryCommand, CatalogError>,
    ) -> Result<InventoryItem, CatalogError> {
        let item = commit_with_retry(
            operation,
            self.config.max_commit_attempts,
            || {
                let mut item = self.load_item(item_id)?;
                let cmd = command(&item, self.clock.now())?;
                let events = item
                    .handle(&cmd)
                    .map_err(|e| catalog_error(item_id, e))?;
                if events.is_empty() {
                    return Ok(item);
                }

                let expected = ExpectedVersion::Exact(item.version());
                let uncommitted = encode_events(item_id.0, streams::INVENTORY_ITEM, &events)?;
                self.dispatcher.store().append(uncommitted, expected)?;

                for e in &events {
                    item.apply(e);
                }
                Ok(item)
            },
            |attempts| CatalogError::Contention { attempts },
        )?;

        tracing::info!(operation, item_id = %item_id, version = item.version(), "item updated");
        Ok(item)
    }
}

fn catalog_error(item_id: InventoryItemId, err: DomainError) -> CatalogError {
    match err {
        DomainError::NotFound => CatalogError::ItemNotFound(item_id),
        DomainError::Validation(msg)
        | DomainError::InvariantViolation(msg)
        | DomainError::InvalidId(msg)
        | DomainError::Conflict(msg) => CatalogError::Validation(msg),
    }
}
