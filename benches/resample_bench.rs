//! Benchmarks for kernel construction and block resampling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use phosphor_scope::audio::synth::circle_block;
use phosphor_scope::audio::{FilterSettings, KernelTable, Resampler, SweepGenerator, SweepParams};

const SAMPLE_RATE: u32 = 48000;

fn bench_kernel_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Kernel Build");

    for (order, steps) in [(4, 4), (8, 6), (16, 8)] {
        group.bench_with_input(
            BenchmarkId::new("build", format!("{order}x{steps}")),
            &(order, steps),
            |b, &(order, steps)| {
                b.iter(|| black_box(KernelTable::build(order, steps, 1.5)));
            },
        );
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resample");

    for block_len in [256, 512, 1024, 2048] {
        let prev = circle_block(440.0, SAMPLE_RATE, block_len, 0);
        let cur = circle_block(440.0, SAMPLE_RATE, block_len, 1);
        let mut resampler = Resampler::new(FilterSettings::default()).unwrap();
        let mut out = Vec::new();

        group.throughput(Throughput::Elements(block_len as u64));
        group.bench_with_input(BenchmarkId::new("resample_into", block_len), &block_len, |b, _| {
            b.iter(|| {
                resampler
                    .resample_into(black_box(&prev.x), black_box(&cur.x), &mut out)
                    .unwrap();
                black_box(out.len());
            });
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let block = circle_block(440.0, SAMPLE_RATE, 512, 0);
    let params = SweepParams::from_ms_per_div(1.0, 0.0, 0.0, SAMPLE_RATE as f32);
    let mut sweep = SweepGenerator::new();
    let mut x = block.x.clone();

    c.bench_function("sweep_apply_512", |b| {
        b.iter(|| black_box(sweep.apply(&mut x, black_box(&block.y), &params)));
    });
}

criterion_group!(benches, bench_kernel_build, bench_resample, bench_sweep);
criterion_main!(benches);
