use std::sync::RwLock;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use backoffice_events::EventEnvelope;
use backoffice_ledger::{LedgerAggregates, LedgerEvent, TransactionKind};

use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::KeyedStore;
use crate::streams;

/// Calendar month a transaction falls in (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl core::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Sales and purchase totals for one month, in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub period: ReportPeriod,
    pub total_sales: u128,
    pub total_purchases: u128,
    pub sale_count: u64,
    pub purchase_count: u64,
}

impl MonthlyTotals {
    fn empty(period: ReportPeriod) -> Self {
        Self {
            period,
            total_sales: 0,
            total_purchases: 0,
            sale_count: 0,
            purchase_count: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerReportError {
    #[error("failed to deserialize journal event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Monthly report projection over the journal.
///
/// Idempotent by global position: envelopes at or below the cursor are
/// ignored, so redelivery and overlapping replays are safe.
#[derive(Debug)]
pub struct LedgerReportProjection<S>
where
    S: KeyedStore<ReportPeriod, MonthlyTotals>,
{
    store: S,
    cursor: RwLock<u64>,
}

impl<S> LedgerReportProjection<S>
where
    S: KeyedStore<ReportPeriod, MonthlyTotals>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursor: RwLock::new(0),
        }
    }

    /// Global position of the last envelope applied.
    pub fn position(&self) -> u64 {
        match self.cursor.read() {
            Ok(c) => *c,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn period(&self, period: ReportPeriod) -> Option<MonthlyTotals> {
        self.store.get(&period)
    }

    /// Every month with activity, oldest first.
    pub fn periods(&self) -> Vec<MonthlyTotals> {
        let mut rows = self.store.list();
        rows.sort_by_key(|r| r.period);
        rows
    }

    /// Totals across all months.
    pub fn overall(&self) -> LedgerAggregates {
        self.store.list().iter().fold(LedgerAggregates::default(), |mut acc, m| {
            acc.total_sales += m.total_sales;
            acc.total_purchases += m.total_purchases;
            acc.sale_count += m.sale_count;
            acc.purchase_count += m.purchase_count;
            acc
        })
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), LedgerReportError> {
        let mut cursor = match self.cursor.write() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let position = envelope.global_position();
        if position <= *cursor {
            return Ok(());
        }

        if envelope.aggregate_type() == streams::LEDGER_JOURNAL {
            let event: LedgerEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| LedgerReportError::Deserialize(e.to_string()))?;

            match event {
                LedgerEvent::TransactionRecorded(e) => {
                    let period = ReportPeriod::of(e.occurred_at);
                    let mut row = self.store.get(&period).unwrap_or_else(|| MonthlyTotals::empty(period));
                    match e.kind {
                        TransactionKind::Sale => {
                            row.total_sales += u128::from(e.total.amount());
                            row.sale_count += 1;
                        }
                        TransactionKind::Purchase => {
                            row.total_purchases += u128::from(e.total.amount());
                            row.purchase_count += 1;
                        }
                    }
                    self.store.upsert(period, row);
                }
            }
        }

        *cursor = position;
        Ok(())
    }

    /// Apply everything committed after the cursor.
    pub fn catch_up(&self, source: &impl EventStore) -> Result<(), LedgerReportError> {
        for stored in source.read_all(self.position())? {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying the store.
    pub fn rebuild_from_scratch(&self, source: &impl EventStore) -> Result<(), LedgerReportError> {
        let events = source.read_all(0)?;

        match self.cursor.write() {
            Ok(mut c) => *c = 0,
            Err(poisoned) => *poisoned.into_inner() = 0,
        }
        self.store.clear();

        for stored in &events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }
}
