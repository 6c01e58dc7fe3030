use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use backoffice_core::AggregateId;
use backoffice_events::EventEnvelope;
use backoffice_inventory::{InventoryEvent, InventoryItem, InventoryItemId, ItemCategory, StockStatus};

use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::KeyedStore;
use crate::streams;

/// Queryable stock row for one active item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: String,
    pub category: ItemCategory,
    pub stock: u64,
    pub status: StockStatus,
}

impl StockLevel {
    pub fn of(item: &InventoryItem, low_threshold: u64) -> Self {
        Self {
            item_id: item.id_typed(),
            name: item.name().to_string(),
            sku: item.sku().to_string(),
            category: item.category(),
            stock: item.stock(),
            status: StockStatus::classify(item.stock(), low_threshold),
        }
    }
}

#[derive(Debug, Error)]
pub enum StockLevelsProjectionError {
    #[error("failed to deserialize inventory event: {0}")]
    Deserialize(String),

    #[error("event item_id does not match envelope aggregate_id")]
    StreamMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Stock levels projection.
///
/// Consumes published item envelopes and keeps one [`StockLevel`] per active
/// item. Retired items are dropped. Disposable and rebuildable from the store.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: KeyedStore<InventoryItemId, StockLevel>,
{
    store: S,
    low_threshold: u64,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: KeyedStore<InventoryItemId, StockLevel>,
{
    pub fn new(store: S, low_threshold: u64) -> Self {
        Self {
            store,
            low_threshold,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, item_id: &InventoryItemId) -> Option<StockLevel> {
        self.store.get(item_id)
    }

    /// All rows, sorted by name then SKU.
    pub fn list(&self) -> Vec<StockLevel> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        rows
    }

    /// Rows that need restocking: out of stock first, then lowest stock.
    pub fn reorder_list(&self) -> Vec<StockLevel> {
        let mut rows: Vec<StockLevel> = self
            .store
            .list()
            .into_iter()
            .filter(|r| r.status != StockStatus::InStock)
            .collect();
        rows.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Ignores envelopes from other aggregate types
    /// - Enforces contiguous sequence numbers per item stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), StockLevelsProjectionError> {
        if envelope.aggregate_type() != streams::INVENTORY_ITEM {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = match self.cursors.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let last = cursors.get(&aggregate_id).copied().unwrap_or(0);

        if seq <= last {
            // Duplicate or replay.
            return Ok(());
        }
        if seq != last + 1 {
            return Err(StockLevelsProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockLevelsProjectionError::Deserialize(e.to_string()))?;
        if event.item_id().0 != aggregate_id {
            return Err(StockLevelsProjectionError::StreamMismatch);
        }

        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.store.upsert(
                    e.item_id,
                    StockLevel {
                        item_id: e.item_id,
                        name: e.name,
                        sku: e.sku,
                        category: e.category,
                        stock: e.opening_stock,
                        status: StockStatus::classify(e.opening_stock, self.low_threshold),
                    },
                );
            }
            InventoryEvent::ItemRenamed(e) => {
                if let Some(mut row) = self.store.get(&e.item_id) {
                    row.name = e.name;
                    self.store.upsert(e.item_id, row);
                }
            }
            InventoryEvent::ItemRepriced(_) => {}
            InventoryEvent::ItemRetired(e) => {
                self.store.remove(&e.item_id);
            }
            InventoryEvent::StockAdjusted(e) => {
                if let Some(mut row) = self.store.get(&e.item_id) {
                    row.stock = row.stock.saturating_add_signed(e.delta);
                    row.status = StockStatus::classify(row.stock, self.low_threshold);
                    self.store.upsert(e.item_id, row);
                }
            }
        }

        cursors.insert(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying the store.
    pub fn rebuild_from_scratch(&self, source: &impl EventStore) -> Result<(), StockLevelsProjectionError> {
        let events = source.read_all(0)?;

        match self.cursors.write() {
            Ok(mut c) => c.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        self.store.clear();

        for stored in &events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }
}
