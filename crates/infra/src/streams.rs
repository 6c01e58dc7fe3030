//! Aggregate type tags stored with every event.

pub const INVENTORY_ITEM: &str = "inventory.item";
pub const INVENTORY_CATALOG: &str = "inventory.catalog";
pub const LEDGER_JOURNAL: &str = "ledger.journal";
