use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rigid_align::algorithms::{calc_ccf, rotational_footprint, FootprintMode};
use rigid_align::{AlgorithmConfig, AlignerRegistry, ImageTransformer, SyntheticImage, Transform};

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");
    for size in [64usize, 128, 256] {
        let reference = SyntheticImage::phantom(size).render();
        let image = ImageTransformer::apply(&reference, &Transform::new_2d(20.0, 3.0, -2.0, false));
        let id = format!("{}x{}", size, size);

        group.bench_with_input(BenchmarkId::new("calc_ccf", &id), &image, |b, i| {
            b.iter(|| calc_ccf(black_box(i), Some(black_box(&reference))))
        });
        group.bench_with_input(BenchmarkId::new("footprint", &id), &image, |b, i| {
            b.iter(|| rotational_footprint(black_box(i), FootprintMode::Autocorrelation))
        });
    }
    group.finish();
}

fn bench_aligners(c: &mut Criterion) {
    let registry = AlignerRegistry::with_defaults();
    let reference = SyntheticImage::phantom(64).render();
    let image = ImageTransformer::apply(&reference, &Transform::new_2d(-35.0, 2.0, 1.0, true));
    let empty = AlgorithmConfig::new();

    let mut group = c.benchmark_group("aligners");
    group.sample_size(10);
    for name in [
        "translational",
        "rotational",
        "rotate_translate",
        "rotate_translate_flip",
        "refined:rotate_translate_flip",
        "rtf_exhaustive",
    ] {
        group.bench_function(name, |b| {
            b.iter(|| registry.align(name, black_box(&image), Some(&reference), "ccc", &empty, &empty))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_primitives, bench_aligners);
criterion_main!(benches);
