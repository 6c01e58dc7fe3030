use thiserror::Error;

use backoffice_inventory::InventoryItemId;

use crate::transaction::TransactionId;

/// Errors surfaced by ledger operations.
///
/// Every variant leaves stock and the journal untouched. None are retried
/// automatically; see [`LedgerError::is_retryable`] for which ones a caller may
/// resubmit unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("inventory item {0} not found")]
    ItemNotFound(InventoryItemId),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("invalid unit price: {0}")]
    InvalidPrice(String),

    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: InventoryItemId,
        requested: u64,
        available: u64,
    },

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("transaction {0} has already been reversed")]
    AlreadyReversed(TransactionId),

    #[error("transaction {0} is a reversal and cannot be reversed")]
    NotReversible(TransactionId),

    #[error("gave up after {attempts} conflicting commit attempts")]
    Contention { attempts: u32 },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl LedgerError {
    /// True when nothing about the request was wrong and the identical request
    /// may be submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::PersistenceFailure(_) | LedgerError::Contention { .. }
        )
    }
}
