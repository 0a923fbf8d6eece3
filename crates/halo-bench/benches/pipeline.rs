//! Criterion benchmarks for ingestion and the full group-finding pipeline.

use std::hint::black_box;
use std::sync::{Arc, Mutex};

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use halo_bench::{bench_config, bench_sim, reference_kernels, reference_profile, stress_profile};
use halo_core::OutputFormat;
use halo_engine::{
    normalize, partition, CosmoInfo, GroupFinder, InMemoryParams, InvokeRequest, PartitionMode,
    Session, SessionOptions, StagePlan, UnitInfo,
};
use halo_kernel::KernelContext;
use halo_test_utils::{recording_registry, Recording, RecordingWriter};
use rayon::ThreadPoolBuilder;

fn bench_partition_10k(c: &mut Criterion) {
    let profile = reference_profile(42);
    let config = bench_config();
    let mode = PartitionMode::for_search(config.search_type, config.baryon_mode);
    let arena_config = config.arena_config();

    c.bench_function("partition_10k", |b| {
        b.iter(|| {
            let arena = partition(&profile.particles, profile.counts, mode, &arena_config).unwrap();
            black_box(arena.len());
        });
    });
}

fn bench_group_finder(c: &mut Criterion, name: &str, profile: halo_bench::Profile) {
    let mut config = bench_config();
    let sim = bench_sim();
    let units = UnitInfo::default();
    normalize(&mut config, &CosmoInfo::default(), &sim, &units);
    let params = config.search_params(&units);
    let pool = ThreadPoolBuilder::new().build().unwrap();
    let ctx = KernelContext::new(&params, &pool);
    let kernels = reference_kernels();
    let finder = GroupFinder::new(&kernels, StagePlan::from_config(&config));
    let mode = PartitionMode::for_search(config.search_type, config.baryon_mode);
    let arena_config = config.arena_config();

    c.bench_function(name, |b| {
        b.iter_batched(
            || partition(&profile.particles, profile.counts, mode, &arena_config).unwrap(),
            |mut arena| {
                let shared = Arc::new(Mutex::new(Recording::default()));
                let mut writer = RecordingWriter::new(OutputFormat::Ascii, shared);
                let summary = finder.run(&ctx, &mut arena, &mut writer).unwrap();
                black_box(summary.ngroups);
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_group_finder_10k(c: &mut Criterion) {
    bench_group_finder(c, "group_finder_10k", reference_profile(42));
}

fn bench_group_finder_100k(c: &mut Criterion) {
    bench_group_finder(c, "group_finder_100k", stress_profile(42));
}

fn bench_invoke_10k(c: &mut Criterion) {
    let profile = reference_profile(42);
    let sim = bench_sim();
    let (writers, _recording) = recording_registry(OutputFormat::Ascii);
    let mut session = Session::init(
        &InMemoryParams::new(bench_config()),
        UnitInfo::default(),
        &sim,
        reference_kernels(),
        writers,
        SessionOptions::default(),
    )
    .unwrap();

    c.bench_function("invoke_10k", |b| {
        b.iter(|| {
            let report = session
                .invoke(InvokeRequest {
                    snapshot: 0,
                    output_name: "bench".into(),
                    cosmology: CosmoInfo::default(),
                    sim: sim.clone(),
                    counts: profile.counts,
                    particles: &profile.particles,
                })
                .unwrap();
            black_box(report.summary.ngroups);
        });
    });
}

criterion_group!(
    benches,
    bench_partition_10k,
    bench_group_finder_10k,
    bench_group_finder_100k,
    bench_invoke_10k
);
criterion_main!(benches);
