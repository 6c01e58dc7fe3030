//! Inventory domain module (event-sourced).
//!
//! Business rules for catalog items and their stock, implemented purely as
//! deterministic domain logic (no IO, no storage). Stock only moves through
//! `AdjustStock`, which the ledger issues for recorded sales and purchases.

pub mod catalog;
pub mod item;
pub mod status;

pub use catalog::{CATALOG_STREAM_ID, Catalog, CatalogCommand, CatalogEvent, ClaimSku, SkuClaimed, normalize_sku};
pub use item::{
    AdjustStock, InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId, ItemCategory,
    ItemRegistered, ItemRenamed, ItemRepriced, ItemRetired, RegisterItem, RenameItem, RepriceItem,
    RetireItem, StockAdjusted, StockReason,
};
pub use status::{DEFAULT_LOW_STOCK_THRESHOLD, StockStatus};
