//! Criterion benchmarks for the dynafield simulation core.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dynafield::prelude::*;

/// Gaussian input bump centered on `center`, in index units.
fn bump(size: usize, center: usize, amplitude: f64) -> Vec<f64> {
    let ring = RingGeometry::new(size, 1.0);
    (0..size)
        .map(|i| {
            let d = ring.index_distance(i as f64, center as f64);
            amplitude * (-d * d / 18.0).exp()
        })
        .collect()
}

/// Benchmark the leaky integrator with varying field sizes.
fn bench_field_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_step");

    for size in [90, 180, 360, 720].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("leaky_integrator", size), size, |b, &size| {
            let mut field = Field::new(FieldConfig::with_size(size, 0.5).with_seed(42));
            let input = bump(size, size / 2, 12.0);

            b.iter(|| {
                field.add_input(&input);
                field.step(0.0, 1.0);
                black_box(field.activation()[0])
            });
        });
    }

    group.finish();
}

/// Benchmark the matrix transform at the three reference coupling shapes.
fn bench_coupling_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("coupling_transform");

    for (input, output) in [(180, 14), (360, 28), (720, 56)].iter() {
        group.throughput(Throughput::Elements((input * output) as u64));

        group.bench_with_input(
            BenchmarkId::new("transform", format!("{input}x{output}")),
            &(*input, *output),
            |b, &(input, output)| {
                let mut coupling = Coupling::new(CouplingConfig::with_sizes(input, output).with_seed(42));
                let pre = bump(input, input / 2, 1.0);

                b.iter(|| {
                    coupling.add_input(&pre);
                    coupling.step(0.0, 1.0);
                    black_box(coupling.output()[0])
                });
            },
        );
    }

    group.finish();
}

/// Benchmark one weight-update pass per learning rule.
fn bench_training_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_update");

    let input = 360;
    let output = 28;
    group.throughput(Throughput::Elements((input * output) as u64));

    for rule in [
        LearningRule::Hebbian,
        LearningRule::WidrowHoff,
        LearningRule::KroghHertz,
    ] {
        group.bench_function(format!("{rule:?}"), |b| {
            let mut coupling = Coupling::new(CouplingConfig {
                rule,
                ..CouplingConfig::with_sizes(input, output).with_seed(42)
            });
            let pre: Vec<f64> = bump(input, input / 2, 2.0).iter().map(|v| v - 1.0).collect();
            let target: Vec<f64> = bump(output, output / 2, 2.0).iter().map(|v| v - 1.0).collect();

            b.iter(|| {
                coupling.update_weights(&pre, &target);
                black_box(coupling.weight(0, 0))
            });
        });
    }

    group.finish();
}

/// Benchmark the centroid read-out with varying field sizes.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [90, 360, 720].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("centroid", size), size, |b, &size| {
            let ring = RingGeometry::new(size, 0.5);
            let activation = bump(size, size / 4, 1.0);

            b.iter(|| black_box(decode_centroid(&activation, ring)));
        });
    }

    group.finish();
}

/// Benchmark the image round-trip on a trained rig.
fn bench_image_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    group.bench_function("save", |b| {
        let mut rig = Rig::new(RigConfig::default().with_seed(42));
        rig.train_associations(&hue_angle_pairs(), 50, 20);
        let mut buf = Vec::with_capacity(256 * 1024);

        b.iter(|| {
            buf.clear();
            rig.save_image_to(&mut buf).unwrap();
            black_box(buf.len())
        });
    });

    group.bench_function("load", |b| {
        let mut rig = Rig::new(RigConfig::default().with_seed(42));
        rig.train_associations(&hue_angle_pairs(), 50, 20);
        let mut buf = Vec::new();
        rig.save_image_to(&mut buf).unwrap();

        b.iter(|| {
            rig.load_image_from(&mut buf.as_slice()).unwrap();
            black_box(rig.output_centroid())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_field_step,
    bench_coupling_transform,
    bench_training_update,
    bench_decode,
    bench_image_roundtrip,
);

criterion_main!(benches);
