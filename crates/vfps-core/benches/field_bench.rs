// -------------------------------------------------------------------------
// VFPS -- Collective-field benchmark
// Wake-potential refresh (FFT, spectrum product, inverse FFT) per step.
// -------------------------------------------------------------------------

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use vfps_core::field::ElectricField;
use vfps_core::impedance::Impedance;
use vfps_core::wake::{WakePotentialMap, WakeScaling};
use vfps_math::interp::InterpolationOrder;
use vfps_types::phasespace::PhaseSpace;

fn make_mesh(n: usize) -> PhaseSpace {
    let mut ps = PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-9, 1e-3, 1e-3, 600.0).unwrap();
    ps.seed_gaussian(1.0).unwrap();
    ps.update_x_projection();
    ps
}

fn bench_wake_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("wake_update");
    for &n in &[128usize, 256] {
        let padding = 2;
        let mesh = make_mesh(n);
        let f_max = 1.0e12;
        let z = Arc::new(
            Impedance::parallel_plates_csr(n * padding, 8.5e6, f_max, 0.03).unwrap(),
        );
        let mut field = ElectricField::new(&mesh, z, 1e-3, padding).unwrap();
        let scaling = WakeScaling {
            revolution_part: 0.1,
            energy_spread: mesh.energy_spread(),
            p_delta: mesh.axis(1).delta(),
        };
        let mut map = WakePotentialMap::new(n, InterpolationOrder::Cubic, false, scaling);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                map.update(black_box(&mesh), &mut field).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_wake_update);
criterion_main!(benches);
