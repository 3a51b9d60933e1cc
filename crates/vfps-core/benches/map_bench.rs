// -------------------------------------------------------------------------
// VFPS -- Source-map application benchmark
// Compares precomputed vs on-the-fly rotation and the Fokker-Planck
// stencil at production mesh sizes.
// -------------------------------------------------------------------------

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use vfps_core::backend::CpuBackend;
use vfps_core::fokker_planck::{FPType, FokkerPlanckMap};
use vfps_core::rotation::RotationMap;
use vfps_core::sourcemap::SourceMap;
use vfps_math::interp::InterpolationOrder;
use vfps_types::config::DerivationOrder;
use vfps_types::phasespace::PhaseSpace;

fn make_mesh(n: usize) -> PhaseSpace {
    let mut ps = PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-9, 1e-3, 1e-3, 600.0).unwrap();
    ps.seed_gaussian(1.0).unwrap();
    ps
}

fn bench_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotation_apply");
    for &n in &[128usize, 256] {
        let angle = 2.0 * std::f64::consts::PI / 4000.0;
        let input = make_mesh(n);
        let mut output = make_mesh(n);
        let mut backend = CpuBackend;

        let precomputed =
            RotationMap::new(n, angle, InterpolationOrder::Cubic, false, true).unwrap();
        group.bench_with_input(BenchmarkId::new("precomputed", n), &n, |b, _| {
            b.iter(|| {
                precomputed
                    .apply(black_box(&input), &mut output, &mut backend)
                    .unwrap();
            })
        });

        let on_the_fly =
            RotationMap::new(n, angle, InterpolationOrder::Cubic, false, false).unwrap();
        group.bench_with_input(BenchmarkId::new("on_the_fly", n), &n, |b, _| {
            b.iter(|| {
                on_the_fly
                    .apply(black_box(&input), &mut output, &mut backend)
                    .unwrap();
            })
        });
    }
    group.finish();
}

fn bench_fokker_planck(c: &mut Criterion) {
    let mut group = c.benchmark_group("fokker_planck_apply");
    for &n in &[128usize, 256] {
        let input = make_mesh(n);
        let mut output = make_mesh(n);
        let mut backend = CpuBackend;
        let map = FokkerPlanckMap::new(
            n,
            FPType::Full,
            1.0e-4,
            DerivationOrder::Linear,
            input.axis(1),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                map.apply(black_box(&input), &mut output, &mut backend)
                    .unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rotation, bench_fokker_planck);
criterion_main!(benches);
