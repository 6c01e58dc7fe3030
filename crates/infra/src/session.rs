//! Session lifecycle: explicit wiring of store, bus, services and workers.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;

use backoffice_events::{EventEnvelope, InMemoryEventBus};
use backoffice_inventory::InventoryItemId;

use crate::catalog_service::CatalogService;
use crate::config::LedgerConfig;
use crate::event_store::{EventStoreError, InMemoryEventStore, PublishingEventStore};
use crate::ledger_service::LedgerService;
use crate::projections::{LedgerReportProjection, MonthlyTotals, ReportPeriod, StockLevel, StockLevelsProjection};
use crate::read_model::InMemoryKeyedStore;
use crate::workers::{ProjectionWorker, WorkerHandle};

pub type SessionBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type SessionStore = Arc<PublishingEventStore<Arc<InMemoryEventStore>, SessionBus>>;
pub type ReportProjection = LedgerReportProjection<Arc<InMemoryKeyedStore<ReportPeriod, MonthlyTotals>>>;
pub type StockProjection = StockLevelsProjection<Arc<InMemoryKeyedStore<InventoryItemId, StockLevel>>>;

/// One running back office: constructed at start, torn down by `shutdown`.
pub struct BackofficeSession {
    config: LedgerConfig,
    events: Arc<InMemoryEventStore>,
    store: SessionStore,
    ledger: LedgerService<SessionStore>,
    catalog: CatalogService<SessionStore>,
    report: Arc<ReportProjection>,
    stock: Arc<StockProjection>,
    workers: Vec<WorkerHandle>,
}

impl BackofficeSession {
    /// Validate `config`, initialize tracing and start the projection workers.
    pub fn start(config: LedgerConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid ledger configuration")?;
        backoffice_observability::init_with(config.log_format);

        let events = Arc::new(InMemoryEventStore::new());
        let bus: SessionBus = Arc::new(InMemoryEventBus::new());
        let store: SessionStore = Arc::new(PublishingEventStore::new(events.clone(), bus.clone()));

        let report: Arc<ReportProjection> = Arc::new(LedgerReportProjection::new(Arc::new(InMemoryKeyedStore::new())));
        let stock: Arc<StockProjection> = Arc::new(StockLevelsProjection::new(
            Arc::new(InMemoryKeyedStore::new()),
            config.low_stock_threshold,
        ));

        let mut workers = Vec::with_capacity(2);
        let report_sink = report.clone();
        workers.push(
            ProjectionWorker::spawn("ledger-report", &bus, move |env: EventEnvelope<JsonValue>| {
                report_sink.apply_envelope(&env)
            })
            .context("failed to spawn ledger report worker")?,
        );
        let stock_sink = stock.clone();
        workers.push(
            ProjectionWorker::spawn("stock-levels", &bus, move |env: EventEnvelope<JsonValue>| {
                stock_sink.apply_envelope(&env)
            })
            .context("failed to spawn stock levels worker")?,
        );

        tracing::info!(
            max_commit_attempts = config.max_commit_attempts,
            low_stock_threshold = config.low_stock_threshold,
            "backoffice session started"
        );

        Ok(Self {
            ledger: LedgerService::new(store.clone(), config.clone()),
            catalog: CatalogService::new(store.clone(), config.clone()),
            config,
            events,
            store,
            report,
            stock,
            workers,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerService<SessionStore> {
        &self.ledger
    }

    pub fn catalog(&self) -> &CatalogService<SessionStore> {
        &self.catalog
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Monthly report, updated asynchronously from the bus.
    pub fn report(&self) -> &ReportProjection {
        &self.report
    }

    /// Stock levels, updated asynchronously from the bus.
    pub fn stock_levels(&self) -> &StockProjection {
        &self.stock
    }

    /// Global position of the latest commit.
    pub fn head(&self) -> Result<u64, EventStoreError> {
        self.events.head()
    }

    /// Stop the workers after they drain what was already published.
    pub fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown();
        }
        tracing::info!("backoffice session stopped");
    }
}
