//! Haissinski seeding: fixed-point iteration toward the static
//! self-consistent bunch shape under the wake force.
//!
//! Each pass rebuilds the longitudinal profile as
//! exp(−q²/2 − U(q)), renormalizes it, reconstructs the mesh with the
//! natural Gaussian energy profile, and refreshes the wake from the
//! new profile. Converges under bunch-lengthening conditions.

use crate::field::ElectricField;
use crate::wake::WakeKick;
use vfps_types::error::VfpsResult;
use vfps_types::phasespace::PhaseSpace;

/// Residual below which the profile counts as converged.
pub const DEFAULT_TOLERANCE: f64 = 1.0e-5;

#[derive(Debug, Clone, Copy)]
pub struct HaissinskiResult {
    pub iterations: u32,
    /// Final max |Δpx| between successive profiles.
    pub residual: f64,
    pub converged: bool,
}

pub fn solve(
    mesh: &mut PhaseSpace,
    wake: &mut WakeKick,
    field: &mut ElectricField,
    max_iterations: u32,
    tolerance: f64,
) -> VfpsResult<HaissinskiResult> {
    let n = mesh.n();
    let dq = mesh.axis(0).delta();
    let dp = mesh.axis(1).delta();

    mesh.update_x_projection();
    let mut residual = f64::INFINITY;
    let mut done = 0;

    for iteration in 0..max_iterations {
        wake.update(mesh, field)?;

        // wake force in p-axis units acts as the potential term
        let mut profile = mesh.x_projection().clone();
        let mut charge = 0.0;
        for (i, px) in profile.iter_mut().enumerate() {
            let q = mesh.axis(0).at(i);
            let u = wake.force()[i] * dp;
            *px = (-0.5 * q * q - u).exp();
            charge += *px * dq;
        }
        profile.mapv_inplace(|v| v / charge);

        residual = profile
            .iter()
            .zip(mesh.x_projection().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);

        mesh.set_x_projection(&profile)?;
        mesh.create_from_projection();
        done = iteration + 1;
        if residual < tolerance {
            break;
        }
    }

    mesh.update_x_projection();
    mesh.normalize()?;

    Ok(HaissinskiResult {
        iterations: done,
        residual,
        converged: residual < tolerance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impedance::Impedance;
    use crate::wake::{WakePotentialMap, WakeScaling};
    use num_complex::Complex64;
    use std::sync::Arc;
    use vfps_math::interp::InterpolationOrder;

    fn setup(n: usize, strength: f64) -> (PhaseSpace, WakeKick, ElectricField) {
        let mut mesh =
            PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-10, 1e-4, 1e-3, 600.0).unwrap();
        mesh.seed_gaussian(1.0).unwrap();
        mesh.update_x_projection();

        let f_max = 1.0e12;
        let bins = 2 * n;
        let delta_f = f_max / bins as f64;
        let values: Vec<Complex64> = (0..bins)
            .map(|k| {
                let f = k as f64 * delta_f;
                Complex64::new(strength, 0.0) / Complex64::new(1.0, f / (0.1 * f_max))
            })
            .collect();
        let z = Arc::new(Impedance::from_spectrum(values, f_max).unwrap());
        let field = ElectricField::new(&mesh, z, 1e-4, 2).unwrap();
        let scaling = WakeScaling {
            revolution_part: 0.05,
            energy_spread: mesh.energy_spread(),
            p_delta: mesh.axis(1).delta(),
        };
        let wake = WakeKick::Potential(WakePotentialMap::new(
            n,
            InterpolationOrder::Cubic,
            false,
            scaling,
        ));
        (mesh, wake, field)
    }

    #[test]
    fn test_converges_to_fixed_point() {
        let (mut mesh, mut wake, mut field) = setup(64, 50.0);
        let result = solve(&mut mesh, &mut wake, &mut field, 50, 1e-4).unwrap();
        assert!(result.converged, "residual = {}", result.residual);
        assert!(result.iterations <= 50);
        // still normalized
        mesh.update_x_projection();
        assert!((mesh.integral().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_wake_skews_profile() {
        let (mut mesh, mut wake, mut field) = setup(64, 2000.0);
        solve(&mut mesh, &mut wake, &mut field, 60, 1e-6).unwrap();
        mesh.update_x_projection();
        assert!((mesh.integral().unwrap() - 1.0).abs() < 1e-10);
        mesh.update_moments(0);
        // a resistive wake must push the centroid off zero
        assert!(
            mesh.mean(0).abs() > 1e-5,
            "profile centroid stayed at {}",
            mesh.mean(0)
        );
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let (mut mesh, mut wake, mut field) = setup(32, 50.0);
        let before = mesh.data().clone();
        let result = solve(&mut mesh, &mut wake, &mut field, 0, 1e-4).unwrap();
        assert_eq!(result.iterations, 0);
        assert!(!result.converged);
        let diff: f64 = mesh
            .data()
            .iter()
            .zip(before.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff < 1e-9, "mesh changed without iterations: {diff}");
    }
}
