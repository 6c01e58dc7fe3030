//! Sales/purchase ledger (event-sourced).
//!
//! Pure domain logic only: the transaction record, proposal validation, the
//! journal aggregate that owns transaction ids and reversal links, and the
//! derived aggregates reporting reads. No IO, no persistence concerns.

pub mod aggregates;
pub mod error;
pub mod filter;
pub mod journal;
pub mod proposal;
pub mod transaction;

pub use aggregates::LedgerAggregates;
pub use error::LedgerError;
pub use filter::TransactionFilter;
pub use journal::{JOURNAL_STREAM_ID, Journal, JournalCommand};
pub use proposal::ProposeTransaction;
pub use transaction::{
    LedgerEvent, PaymentStatus, Transaction, TransactionId, TransactionKind, TransactionRecorded,
};
