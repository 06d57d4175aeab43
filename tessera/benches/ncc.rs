use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tessera::registration::{match_template, register_pair};
use tessera::Buffer2;

fn noise(width: usize, height: usize, seed: u64) -> Buffer2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Buffer2::new(width, height, (0..width * height).map(|_| rng.random::<f32>()).collect())
}

fn bench_match_template(c: &mut Criterion) {
    let image = noise(512, 512, 1);
    let mut group = c.benchmark_group("match_template");
    for template_size in [16, 32, 64] {
        let template = image.crop(100, 100, template_size, template_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(template_size),
            &template,
            |b, template| b.iter(|| black_box(match_template(&image, template))),
        );
    }
    group.finish();
}

fn bench_register_pair(c: &mut Criterion) {
    let scene = noise(1000, 520, 2);
    let current = scene.crop(0, 0, 512, 512);
    let next = scene.crop(460, 4, 512, 512);
    c.bench_function("register_pair_512", |b| {
        b.iter(|| black_box(register_pair(&current, &next, 32)))
    });
}

criterion_group!(benches, bench_match_template, bench_register_pair);
criterion_main!(benches);
