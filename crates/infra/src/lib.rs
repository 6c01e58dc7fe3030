//! Infrastructure layer: event store, services, projections, configuration.

pub mod catalog_service;
pub mod clock;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod ledger_service;
pub mod projections;
pub mod query;
pub mod read_model;
pub mod session;
pub mod streams;
pub mod workers;

mod retry;

#[cfg(test)]
mod integration_tests;

pub use catalog_service::{CatalogError, CatalogService, NewItem};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use ledger_service::LedgerService;
pub use query::{Page, Pagination};
pub use session::BackofficeSession;
