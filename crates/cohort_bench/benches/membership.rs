//! Write path and recovery benchmarks.

use cohort_bench::{seeded_service, slugs};
use cohort_core::{Config, Database, MembershipPatch, SegmentService, UserId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::tempdir;

fn bench_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch");

    for batch in [1usize, 10, 50] {
        let adds = slugs(batch);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("memory", batch), &batch, |b, _| {
            let service = seeded_service(0, 0, 0, 0);
            let mut user = 0i64;
            b.iter(|| {
                user += 1;
                let patch = MembershipPatch::new(UserId::new(user)).add_all(adds.iter().cloned());
                black_box(service.patch_membership(patch).unwrap())
            });
        });
    }

    let dir = tempdir().unwrap();
    let db = Database::open_with_config(dir.path(), Config::new().sync_on_commit(false)).unwrap();
    let service = SegmentService::new(Arc::new(db));
    group.bench_function("file_unsynced", |b| {
        let mut user = 0i64;
        b.iter(|| {
            user += 1;
            black_box(
                service
                    .patch_membership(MembershipPatch::new(UserId::new(user)).add("beta"))
                    .unwrap(),
            )
        });
    });

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    c.bench_function("sweep_nothing_expired", |b| {
        let service = seeded_service(20, 0, 1_000, 3);
        b.iter(|| black_box(service.sweep_expired().unwrap()));
    });
}

fn bench_replay(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    {
        let db = Database::open_with_config(dir.path(), Config::new().sync_on_commit(false)).unwrap();
        let service = SegmentService::new(Arc::new(db));
        for user in 0..2_000 {
            service
                .patch_membership(MembershipPatch::new(UserId::new(user)).add("a").add("b"))
                .unwrap();
        }
    }

    c.bench_function("open_replay_2000_patches", |b| {
        b.iter(|| black_box(Database::open(dir.path()).unwrap().committed_seq()));
    });
}

criterion_group!(benches, bench_patch, bench_sweep, bench_replay);
criterion_main!(benches);
