//! Paged reads over read models.

use serde::{Deserialize, Serialize};

/// Offset pagination. `limit == 0` means "use the configured default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Records to skip (0-based).
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(0),
            offset: offset.unwrap_or(0),
        }
    }

    /// Page `page` (1-based) of `size` records.
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            limit: size,
            offset: page.saturating_sub(1).saturating_mul(size),
        }
    }

    /// Replace a zero limit with `default` and cap at `max`.
    pub fn resolve(self, default: u32, max: u32) -> Self {
        let limit = if self.limit == 0 { default } else { self.limit };
        Self {
            limit: limit.min(max),
            offset: self.offset,
        }
    }
}

/// One page of results plus what is needed to fetch the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Records matching the query across all pages.
    pub total: u64,
    /// Pagination actually applied (after defaults and caps).
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Slice `matching` (already in display order) with `pagination`.
    pub fn from_matching(matching: Vec<T>, pagination: Pagination) -> Self {
        let total = matching.len() as u64;
        let offset = pagination.offset as usize;
        let items: Vec<T> = matching
            .into_iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .collect();
        let has_more = (offset as u64).saturating_add(items.len() as u64) < total;

        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}
