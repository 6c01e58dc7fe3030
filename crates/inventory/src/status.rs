use serde::{Deserialize, Serialize};

/// Stock at or below this level (and above zero) counts as low.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;

/// Coarse stock classification for dashboards and reorder lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn classify(stock: u64, low_threshold: u64) -> Self {
        match stock {
            0 => StockStatus::OutOfStock,
            s if s <= low_threshold => StockStatus::LowStock,
            _ => StockStatus::InStock,
        }
    }
}
