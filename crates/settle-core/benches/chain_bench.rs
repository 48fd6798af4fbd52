//! Benchmarks for promise construction, subscription, and dispatch.
//!
//! Run with: cargo bench -p settle-core --bench chain_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use settle_core::{ManualQueue, Promise, Value};
use std::hint::black_box;

// =============================================================================
// Construction
// =============================================================================

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("promise/construct");
    let queue = ManualQueue::new();
    let sched = queue.scheduler();

    group.bench_function("resolved", |b| {
        b.iter(|| black_box(Promise::resolved(&sched, black_box(1))))
    });

    group.bench_function("executor_sync_success", |b| {
        b.iter(|| {
            black_box(Promise::new(&sched, |succeed, _| {
                succeed.succeed(1);
                Ok(())
            }))
        })
    });

    group.bench_function("executor_throw", |b| {
        b.iter(|| black_box(Promise::new(&sched, |_, _| Err(Value::Unit))))
    });

    group.finish();
}

// =============================================================================
// Chains (subscribe + drain)
// =============================================================================

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("promise/chain");

    for len in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("then_int", len), &len, |b, &len| {
            let queue = ManualQueue::new();
            let sched = queue.scheduler();
            b.iter(|| {
                let mut tail = Promise::resolved(&sched, 0);
                for _ in 0..len {
                    tail = tail.then(|v| Ok(Value::Int(v.as_int().unwrap_or(0) + 1)));
                }
                queue.run_until_idle();
                black_box(tail.outcome())
            })
        });
    }

    for fanout in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("fanout_pending", fanout), &fanout, |b, &n| {
            let queue = ManualQueue::new();
            let sched = queue.scheduler();
            b.iter(|| {
                let (p, succeed, _) = Promise::deferred(&sched);
                let derived: Vec<_> = (0..n).map(|_| p.subscribe(None, None)).collect();
                succeed.succeed(1);
                queue.run_until_idle();
                black_box(derived)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_construct, bench_chain);
criterion_main!(benches);
