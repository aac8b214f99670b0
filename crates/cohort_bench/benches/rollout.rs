//! Rollout bucketing and membership assembly benchmarks.

use cohort_bench::seeded_service;
use cohort_core::{RolloutOracle, UserId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_decide(c: &mut Criterion) {
    let oracle = RolloutOracle::new();
    let mut group = c.benchmark_group("decide");

    for percentage in [0i64, 50, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(percentage),
            &percentage,
            |b, &percentage| {
                let mut user = 0i64;
                b.iter(|| {
                    user += 1;
                    black_box(oracle.decide(
                        black_box("avito-voice-messages"),
                        UserId::new(user),
                        percentage,
                    ))
                });
            },
        );
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for segments in [10usize, 100, 500] {
        let service = seeded_service(segments, 2, 100, 5);
        group.throughput(Throughput::Elements(segments as u64));
        group.bench_with_input(BenchmarkId::from_parameter(segments), &segments, |b, _| {
            let mut user = 0i64;
            b.iter(|| {
                user = (user + 1) % 100;
                black_box(service.get_assembled_segments(UserId::new(user)).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decide, bench_assemble);
criterion_main!(benches);
