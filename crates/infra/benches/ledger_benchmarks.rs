use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use backoffice_infra::catalog_service::{CatalogService, NewItem};
use backoffice_infra::config::LedgerConfig;
use backoffice_infra::event_store::InMemoryEventStore;
use backoffice_infra::ledger_service::LedgerService;
use backoffice_infra::projections::{LedgerReportProjection, MonthlyTotals, ReportPeriod};
use backoffice_infra::read_model::InMemoryKeyedStore;
use backoffice_inventory::{InventoryItemId, ItemCategory};
use backoffice_ledger::{ProposeTransaction, TransactionFilter};

type Services = (
    Arc<InMemoryEventStore>,
    LedgerService<Arc<InMemoryEventStore>>,
    InventoryItemId,
);

fn setup(opening_stock: u64) -> Services {
    let store = Arc::new(InMemoryEventStore::new());
    let catalog = CatalogService::new(store.clone(), LedgerConfig::default());
    let ledger = LedgerService::new(store.clone(), LedgerConfig::default());
    let item = catalog
        .register_item(NewItem {
            name: "Bench Item".to_string(),
            sku: "BENCH-1".to_string(),
            category: ItemCategory::Production,
            unit_price: 1000,
            opening_stock,
        })
        .unwrap()
        .id_typed();
    (store, ledger, item)
}

/// Propose latency as the item stream grows: every propose rehydrates the item.
fn bench_propose_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("propose_transaction");

    for history in [0u64, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("purchase_with_history", history), &history, |b, &history| {
            let (_store, ledger, item) = setup(0);
            for _ in 0..history {
                ledger.propose_transaction(ProposeTransaction::purchase(item, 1)).unwrap();
            }
            b.iter(|| {
                ledger
                    .propose_transaction(black_box(ProposeTransaction::purchase(item, 1)))
                    .unwrap()
            });
        });
    }

    group.bench_function("rejected_sale", |b| {
        let (_store, ledger, item) = setup(1);
        b.iter(|| {
            let _ = ledger.propose_transaction(black_box(ProposeTransaction::sale(item, 2)));
        });
    });

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_reads");

    for count in [100u64, 1000] {
        let (_store, ledger, item) = setup(0);
        for _ in 0..count {
            ledger.propose_transaction(ProposeTransaction::purchase(item, 1)).unwrap();
        }

        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("get_aggregates", count), &count, |b, _| {
            b.iter(|| black_box(ledger.get_aggregates().unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("list_transactions", count), &count, |b, _| {
            b.iter(|| black_box(ledger.list_transactions(&TransactionFilter::all()).unwrap()));
        });
    }

    group.finish();
}

fn bench_report_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_projection");

    for count in [100u64, 1000] {
        let (store, ledger, item) = setup(0);
        for _ in 0..count {
            ledger.propose_transaction(ProposeTransaction::purchase(item, 1)).unwrap();
        }

        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("rebuild_from_scratch", count), &count, |b, _| {
            let projection = LedgerReportProjection::new(InMemoryKeyedStore::<ReportPeriod, MonthlyTotals>::new());
            b.iter(|| projection.rebuild_from_scratch(&store).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_propose_latency, bench_reads, bench_report_rebuild);
criterion_main!(benches);
