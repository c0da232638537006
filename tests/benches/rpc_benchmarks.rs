//! # Top-Coins RPC Benchmarks
//!
//! | Path | Operation |
//! |------|-----------|
//! | Request decode | `FetchParams::decode` on typical bodies |
//! | Correlation | register → complete on the pending-call store |
//! | Round trip | client → in-process broker → worker → client |

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_rpc::{
    ClientConfig, CorrelationId, FetchParams, PendingCallStore, TokenGenerator, TokenStrategy,
    PRICING_QUEUE,
};
use std::sync::Arc;
use tc_tests::integration::harness::TestBroker;

fn bench_request_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request-decode");

    for body in ["200", " 100\n", "\"5000\"", ""] {
        group.bench_with_input(BenchmarkId::from_parameter(body.escape_debug()), body, |b, body| {
            b.iter(|| black_box(FetchParams::decode(body.as_bytes(), 100, 5000)))
        });
    }
    group.finish();
}

fn bench_pending_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-store");

    for strategy in [TokenStrategy::Random, TokenStrategy::Sequential] {
        let tokens = TokenGenerator::new(strategy, "amq.gen-bench");
        let store = PendingCallStore::new();

        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::new("register_complete", format!("{strategy:?}")), |b| {
            b.iter(|| {
                let id = tokens.next_id();
                let _rx = store.register(id.clone(), PRICING_QUEUE).unwrap();
                black_box(store.complete(&id, Bytes::from_static(b"[]")))
            })
        });
    }

    let store = PendingCallStore::new();
    let stranger = CorrelationId::new("ZZZZ");
    group.bench_function("complete_unmatched", |b| {
        b.iter(|| black_box(store.complete(&stranger, Bytes::from_static(b"[]"))))
    });
    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (broker, client) = runtime.block_on(async {
        let broker = TestBroker::new();
        broker.spawn_pricing().await;
        let client = broker.client(ClientConfig::default()).await;
        (broker, client)
    });

    let mut group = c.benchmark_group("round-trip");
    for count in [1usize, 100] {
        group.bench_with_input(BenchmarkId::new("pricing", count), &count, |b, &count| {
            let client = Arc::clone(&client);
            b.to_async(&runtime)
                .iter(|| {
                    let client = Arc::clone(&client);
                    async move { client.call(PRICING_QUEUE, count.to_string()).await.unwrap() }
                })
        });
    }
    group.finish();
    drop(broker);
}

criterion_group!(benches, bench_request_decode, bench_pending_store, bench_round_trip);
criterion_main!(benches);
