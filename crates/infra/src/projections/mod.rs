//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All of them are:
//! - **Rebuildable**: can be reconstructed from `EventStore::read_all`
//! - **Idempotent**: safe for at-least-once delivery

pub mod ledger_report;
pub mod stock_levels;

pub use ledger_report::{LedgerReportError, LedgerReportProjection, MonthlyTotals, ReportPeriod};
pub use stock_levels::{StockLevel, StockLevelsProjection, StockLevelsProjectionError};
