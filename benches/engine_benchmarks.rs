use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fulfillment_core::models::order::{Order, OrderItem, OrderStatus};
use fulfillment_core::services::stock_ledger::StockLedger;
use fulfillment_core::store::InMemoryStore;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn order_with_lines(count: usize) -> Order {
    let items = (0..count)
        .map(|i| {
            OrderItem::new(
                Uuid::new_v4(),
                format!("Item {}", i),
                format!("47-110 {:03}", i),
                10,
            )
        })
        .collect();
    let mut order = Order::new("B-1001".to_string(), Uuid::new_v4(), None, items);
    order.status = OrderStatus::Ordered;
    order
}

// Benchmark for status derivation across order sizes
fn status_derivation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("status_derivation");

    for size in [1, 5, 20, 100].iter() {
        let order = order_with_lines(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| OrderStatus::derive_from_items(black_box(&order.items)));
        });
    }

    group.finish();
}

// Benchmark for ledger adjustments through the per-key lock table
fn ledger_adjust_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().expect("bench runtime");
    let ledger = StockLedger::new(Arc::new(InMemoryStore::new()), None);
    let item = Uuid::new_v4();
    let location = Uuid::new_v4();

    c.bench_function("ledger_adjust", |b| {
        b.to_async(&rt).iter(|| {
            let ledger = ledger.clone();
            async move {
                ledger
                    .adjust(black_box(item), black_box(location), 1)
                    .await
                    .unwrap()
            }
        });
    });
}

// Benchmark for building the alias index a matching run resolves against
fn alias_index_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_index");

    for size in [5, 20, 100].iter() {
        let order = order_with_lines(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut index: HashMap<String, Uuid> = HashMap::new();
                for item in black_box(&order.items) {
                    index.insert(
                        fulfillment_core::models::delivery::normalize_identifier(
                            &item.wholesaler_item_number,
                        ),
                        item.item_id,
                    );
                }
                index
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = status_derivation_benchmark, ledger_adjust_benchmark, alias_index_benchmark
}
criterion_main!(benches);
