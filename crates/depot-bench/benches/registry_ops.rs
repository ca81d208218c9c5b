//! Criterion micro-benchmarks for registry setup and Querying-state reads.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depot::{Phase, PhaseIndex, RestrictionId, ShardId, TagId, TagIndex};
use depot_bench::{generate_units, populate, reference_profile, stress_profile};
use depot_test_utils::MockUnit;

const S: ShardId = ShardId(0);

/// Benchmark: register and sort the 1K-unit reference profile.
fn bench_sort_reference(c: &mut Criterion) {
    let units = generate_units(&reference_profile(42));
    c.bench_function("sort_reference_1k", |b| {
        b.iter(|| {
            let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
            populate(&mut index, &units, S).unwrap();
            index.sort(S).unwrap();
            black_box(index.aggregate().shard(S).unwrap().active_len());
        });
    });
}

/// Benchmark: register and sort the 20K-unit stress profile.
fn bench_sort_stress(c: &mut Criterion) {
    let units = generate_units(&stress_profile(42));
    let mut group = c.benchmark_group("stress");
    group.sample_size(10);
    group.bench_function("sort_stress_20k", |b| {
        b.iter(|| {
            let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
            populate(&mut index, &units, S).unwrap();
            index.sort(S).unwrap();
            black_box(index.aggregate().shard(S).unwrap().active_len());
        });
    });
    group.finish();
}

/// Benchmark: primed restriction lookups across every block.
fn bench_restriction_lookup(c: &mut Criterion) {
    let profile = reference_profile(42);
    let units = generate_units(&profile);
    let mut index: PhaseIndex<MockUnit> = PhaseIndex::new(1);
    populate(&mut index, &units, S).unwrap();
    index.sort(S).unwrap();
    index.prime(S).unwrap();
    let linear = index.query(Phase::Linear);

    c.bench_function("restriction_lookup_primed", |b| {
        b.iter(|| {
            let mut total = 0;
            for id in 0..profile.blocks {
                if let Some(view) = linear.try_active_for_restriction(RestrictionId(id), S) {
                    total += view.len();
                }
            }
            black_box(total);
        });
    });
}

/// Benchmark: cold build of every single-tag sub-registry.
fn bench_tag_build(c: &mut Criterion) {
    let profile = reference_profile(42);
    let units = generate_units(&profile);
    c.bench_function("tag_index_build", |b| {
        b.iter(|| {
            let mut index: TagIndex<MockUnit> = TagIndex::new(1);
            for unit in &units {
                index.add(unit.clone(), S).unwrap();
            }
            for tag in 0..profile.tags {
                black_box(index.get_for_tag(TagId(tag), S).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_sort_reference,
    bench_sort_stress,
    bench_restriction_lookup,
    bench_tag_build
);
criterion_main!(benches);
