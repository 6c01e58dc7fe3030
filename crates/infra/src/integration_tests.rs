//! Integration tests for the full pipeline.
//!
//! Command -> EventStore -> EventBus -> Projection -> ReadModel
//!
//! Verifies:
//! - stock change and transaction record commit together or not at all
//! - concurrent sales never drive stock negative
//! - read models catch up with the store

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use proptest::prelude::*;

    use backoffice_core::{AggregateId, Money};
    use backoffice_inventory::{InventoryItemId, ItemCategory, StockStatus};
    use backoffice_ledger::{
        LedgerError, PaymentStatus, ProposeTransaction, TransactionFilter, TransactionKind,
    };

    use crate::catalog_service::{CatalogService, NewItem};
    use crate::config::LedgerConfig;
    use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, StreamAppend};
    use crate::ledger_service::LedgerService;
    use crate::projections::{StockLevel, StockLevelsProjection};
    use crate::read_model::InMemoryKeyedStore;
    use crate::session::BackofficeSession;

    fn new_item(sku: &str, stock: u64, price: i64) -> NewItem {
        NewItem {
            name: format!("Item {sku}"),
            sku: sku.to_string(),
            category: ItemCategory::Production,
            unit_price: price,
            opening_stock: stock,
        }
    }

    /// Poll until `done` holds; the projections run on worker threads.
    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for projections");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Store wrapper that fails on demand.
    #[derive(Debug, Default)]
    struct FaultyStore {
        inner: InMemoryEventStore,
        fail_storage: AtomicBool,
        always_conflict: AtomicBool,
        appends: AtomicU32,
    }

    impl EventStore for FaultyStore {
        fn append_streams(&self, appends: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            if self.always_conflict.load(Ordering::SeqCst) {
                return Err(EventStoreError::Concurrency("someone else won".to_string()));
            }
            if self.fail_storage.swap(false, Ordering::SeqCst) {
                return Err(EventStoreError::Storage("disk full".to_string()));
            }
            self.inner.append_streams(appends)
        }

        fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }

        fn read_all(&self, after: u64) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.read_all(after)
        }
    }

    #[test]
    fn session_runs_the_reference_scenario() {
        let session = BackofficeSession::start(LedgerConfig::default()).unwrap();
        let item = session.catalog().register_item(new_item("SKU-1", 10, 1000)).unwrap().id_typed();

        let sale = session.ledger().propose_transaction(ProposeTransaction::sale(item, 3)).unwrap();
        assert_eq!(sale.total(), Money::new(3000));
        assert_eq!(session.ledger().current_stock(item).unwrap(), 7);

        let err = session.ledger().propose_transaction(ProposeTransaction::sale(item, 10)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 7, .. }));
        assert_eq!(session.ledger().current_stock(item).unwrap(), 7);

        session.ledger().propose_transaction(ProposeTransaction::purchase(item, 5)).unwrap();
        assert_eq!(session.ledger().current_stock(item).unwrap(), 12);

        let agg = session.ledger().get_aggregates().unwrap();
        assert_eq!(agg.total_sales, 3000);
        assert_eq!(agg.total_purchases, 5000);

        let head = session.head().unwrap();
        assert_eq!(head, 6);
        wait_until(|| session.report().position() >= head);
        assert_eq!(session.report().overall(), agg);
        wait_until(|| session.stock_levels().get(&item).is_some_and(|row| row.stock == 12));
        assert_eq!(session.stock_levels().get(&item).unwrap().status, StockStatus::InStock);

        session.shutdown();
    }

    #[test]
    fn concurrent_sales_exhaust_stock_exactly() {
        let store = Arc::new(InMemoryEventStore::new());
        let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
        let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
        let item = catalog.register_item(new_item("SKU-1", 50, 100)).unwrap().id_typed();

        let outcomes: Vec<Result<_, LedgerError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..20)
                .map(|_| s.spawn(|| ledger.propose_transaction(ProposeTransaction::sale(item, 5))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 10);
        for failure in outcomes.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(failure, LedgerError::InsufficientStock { .. }), "unexpected {failure:?}");
        }

        assert_eq!(ledger.current_stock(item).unwrap(), 0);
        let agg = ledger.get_aggregates().unwrap();
        assert_eq!(agg.sale_count, 10);
        assert_eq!(agg.total_sales, 10 * 5 * 100);

        let mut ids: Vec<u64> = ledger
            .list_transactions(&TransactionFilter::all())
            .unwrap()
            .iter()
            .map(|t| t.id_typed().0)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_traffic_on_different_items_stays_consistent() {
        let store = Arc::new(InMemoryEventStore::new());
        let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
        let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
        let items: Vec<InventoryItemId> = (0..4)
            .map(|n| catalog.register_item(new_item(&format!("SKU-{n}"), 20, 10)).unwrap().id_typed())
            .collect();

        std::thread::scope(|s| {
            for &item in &items {
                let ledger = &ledger;
                s.spawn(move || {
                    for _ in 0..10 {
                        ledger.propose_transaction(ProposeTransaction::sale(item, 2)).unwrap();
                        ledger.propose_transaction(ProposeTransaction::purchase(item, 1)).unwrap();
                    }
                });
            }
        });

        for item in items {
            assert_eq!(ledger.current_stock(item).unwrap(), 10);
        }
        let agg = ledger.get_aggregates().unwrap();
        assert_eq!(agg.sale_count, 40);
        assert_eq!(agg.purchase_count, 40);
    }

    #[test]
    fn storage_failure_changes_nothing_and_can_be_retried() {
        let store = Arc::new(FaultyStore::default());
        let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
        let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
        let item = catalog.register_item(new_item("SKU-1", 10, 1000)).unwrap().id_typed();

        store.fail_storage.store(true, Ordering::SeqCst);
        let err = ledger.propose_transaction(ProposeTransaction::sale(item, 3)).unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(ledger.current_stock(item).unwrap(), 10);
        assert!(ledger.list_transactions(&TransactionFilter::all()).unwrap().is_empty());

        let tx = ledger.propose_transaction(ProposeTransaction::sale(item, 3)).unwrap();
        assert_eq!(tx.id_typed().0, 1);
        assert_eq!(ledger.current_stock(item).unwrap(), 7);
    }

    #[test]
    fn endless_conflicts_become_contention() {
        let store = Arc::new(FaultyStore::default());
        let config = LedgerConfig {
            max_commit_attempts: 3,
            ..LedgerConfig::default()
        };
        let catalog = CatalogService::new(store.clone(), config.clone());
        let ledger = LedgerService::new(store.clone(), config);
        let item = catalog.register_item(new_item("SKU-1", 10, 1000)).unwrap().id_typed();

        store.always_conflict.store(true, Ordering::SeqCst);
        let before = store.appends.load(Ordering::SeqCst);
        let err = ledger.propose_transaction(ProposeTransaction::sale(item, 1)).unwrap_err();

        assert_eq!(err, LedgerError::Contention { attempts: 3 });
        assert_eq!(store.appends.load(Ordering::SeqCst) - before, 3);
    }

    #[test]
    fn listing_round_trips_captured_fields_newest_first() {
        let store = Arc::new(InMemoryEventStore::new());
        let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
        let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
        let item = catalog.register_item(new_item("SKU-1", 0, 250)).unwrap().id_typed();

        let mut created = Vec::new();
        for (n, price) in [(4, 200), (2, 300), (1, 50)] {
            let tx = ledger
                .propose_transaction(ProposeTransaction::purchase(item, n).with_unit_price(price).on_credit())
                .unwrap();
            created.push(tx);
        }
        created.push(ledger.propose_transaction(ProposeTransaction::sale(item, 3)).unwrap());

        let listed = ledger.list_transactions(&TransactionFilter::all()).unwrap();
        created.reverse();
        assert_eq!(listed, created);
        assert_eq!(listed[0].unit_price(), Money::new(250));

        let credit = ledger
            .list_transactions(&TransactionFilter::all().payment_status(PaymentStatus::Credit))
            .unwrap();
        assert_eq!(credit.len(), 3);
        assert!(credit.iter().all(|t| t.kind() == TransactionKind::Purchase));
    }

    #[test]
    fn stock_projection_rebuild_matches_catalog_snapshot() {
        let store = Arc::new(InMemoryEventStore::new());
        let config = LedgerConfig::default();
        let catalog = CatalogService::new(store.clone(), config.clone());
        let ledger = LedgerService::new(store.clone(), config.clone());

        let a = catalog.register_item(new_item("SKU-A", 30, 10)).unwrap().id_typed();
        let b = catalog.register_item(new_item("SKU-B", 5, 10)).unwrap().id_typed();
        ledger.propose_transaction(ProposeTransaction::sale(a, 25)).unwrap();
        ledger.propose_transaction(ProposeTransaction::sale(b, 5)).unwrap();

        let projection = StockLevelsProjection::new(
            Arc::new(InMemoryKeyedStore::<InventoryItemId, StockLevel>::new()),
            config.low_stock_threshold,
        );
        projection.rebuild_from_scratch(&store).unwrap();

        assert_eq!(projection.list(), catalog.stock_levels().unwrap());
        let reorder: Vec<InventoryItemId> = projection.reorder_list().iter().map(|r| r.item_id).collect();
        assert_eq!(reorder, vec![b, a]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Sale(i64),
        Purchase(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![(-2i64..15).prop_map(Op::Sale), (-2i64..15).prop_map(Op::Purchase)]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 48,
            ..ProptestConfig::default()
        })]

        /// Property: stock follows accepted operations exactly, never goes
        /// negative, and the aggregates equal the per-kind sums.
        #[test]
        fn ledger_matches_a_simple_model(opening in 0u64..20, ops in prop::collection::vec(op_strategy(), 1..25)) {
            let store = Arc::new(InMemoryEventStore::new());
            let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
            let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
            let item = catalog.register_item(new_item("SKU-P", opening, 7)).unwrap().id_typed();

            let mut stock = opening;
            let mut sales = 0u64;
            let mut purchases = 0u64;

            for op in ops {
                let (request, qty) = match op {
                    Op::Sale(q) => (ProposeTransaction::sale(item, q), q),
                    Op::Purchase(q) => (ProposeTransaction::purchase(item, q), q),
                };
                let is_sale = request.kind == TransactionKind::Sale;

                match ledger.propose_transaction(request) {
                    Ok(tx) => {
                        let q = qty as u64;
                        if is_sale { stock -= q; sales += tx.total().amount(); }
                        else { stock += q; purchases += tx.total().amount(); }
                    }
                    Err(LedgerError::InvalidQuantity(_)) => prop_assert!(qty <= 0),
                    Err(LedgerError::InsufficientStock { available, .. }) => {
                        prop_assert!(is_sale);
                        prop_assert_eq!(available, stock);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert_eq!(ledger.current_stock(item).unwrap(), stock);
            }

            let agg = ledger.get_aggregates().unwrap();
            prop_assert_eq!(agg.total_sales, u128::from(sales));
            prop_assert_eq!(agg.total_purchases, u128::from(purchases));
        }
    }
}
