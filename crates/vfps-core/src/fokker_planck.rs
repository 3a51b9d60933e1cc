// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — FokkerPlanckMap
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Radiation damping and quantum excitation along the energy axis.
//!
//! One step applies Ψ' = Ψ + (ε/2)·∂/∂p(pΨ + ∂Ψ/∂p) with
//! ε = 2Δt/t_d, discretized as a 3- or 5-point stencil per p-column.
//! The unit Gaussian is the stationary state. Boundary rows are
//! absorbing.

use crate::backend::Backend;
use crate::sourcemap::{check_geometry, MapWeight, SourceMap, WeightTable};
use vfps_types::config::DerivationOrder;
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};
use vfps_types::ruler::Ruler;

/// Which parts of the Fokker–Planck operator act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FPType {
    None,
    DampingOnly,
    DiffusionOnly,
    Full,
}

pub struct FokkerPlanckMap {
    n: usize,
    e1: f64,
    fpt: FPType,
    table: WeightTable,
}

impl FokkerPlanckMap {
    /// Build the stencil table for damping rate ε = `e1`.
    ///
    /// Fails with [`VfpsError::UnstableParameters`] when the explicit
    /// scheme would be unstable (ε ≥ 1 or 2D ≥ 1 − ε with
    /// D = ε/(2δp²)).
    pub fn new(
        n: usize,
        fpt: FPType,
        e1: f64,
        derivation: DerivationOrder,
        p_axis: &Ruler,
    ) -> VfpsResult<Self> {
        let dp = p_axis.delta();
        let d = e1 / (2.0 * dp * dp);
        if fpt != FPType::None {
            if e1 >= 1.0 {
                return Err(VfpsError::UnstableParameters(format!(
                    "Fokker-Planck damping increment ε = {e1:.3e} must stay below 1"
                )));
            }
            if 2.0 * d >= 1.0 - e1 {
                return Err(VfpsError::UnstableParameters(format!(
                    "Fokker-Planck diffusion number D = {d:.3e} violates 2D < 1 − ε; \
                     reduce the time step or refine the energy axis"
                )));
            }
        }

        let width = match derivation {
            DerivationOrder::Linear => 3,
            DerivationOrder::Cubic => 5,
        };
        let mut table = WeightTable::new(n * n, width, false);
        match derivation {
            DerivationOrder::Linear => Self::fill_3pt(&mut table, n, fpt, e1, d, dp, p_axis),
            DerivationOrder::Cubic => Self::fill_5pt(&mut table, n, fpt, e1, d, dp, p_axis),
        }

        Ok(FokkerPlanckMap { n, e1, fpt, table })
    }

    pub fn damping_increment(&self) -> f64 {
        self.e1
    }

    pub fn fp_type(&self) -> FPType {
        self.fpt
    }

    fn fill_3pt(
        table: &mut WeightTable,
        n: usize,
        fpt: FPType,
        e1: f64,
        d: f64,
        dp: f64,
        p_axis: &Ruler,
    ) {
        for i in 0..n {
            for j in 1..n - 1 {
                let p = p_axis.at(j);
                let a = e1 * p / (4.0 * dp);
                let (lo, mid, hi) = match fpt {
                    FPType::None => (0.0, 1.0, 0.0),
                    FPType::DampingOnly => (-a, 1.0 + e1 / 2.0, a),
                    FPType::DiffusionOnly => (d, 1.0 - 2.0 * d, d),
                    FPType::Full => (d - a, 1.0 + e1 / 2.0 - 2.0 * d, d + a),
                };
                let base = i * n + j;
                let stencil = table.stencil_mut(base);
                stencil[0] = MapWeight {
                    src: (base - 1) as u32,
                    weight: lo,
                };
                stencil[1] = MapWeight {
                    src: base as u32,
                    weight: mid,
                };
                stencil[2] = MapWeight {
                    src: (base + 1) as u32,
                    weight: hi,
                };
            }
            // rows j = 0 and j = n−1 stay all-zero (absorbing)
        }
    }

    fn fill_5pt(
        table: &mut WeightTable,
        n: usize,
        fpt: FPType,
        e1: f64,
        d: f64,
        dp: f64,
        p_axis: &Ruler,
    ) {
        for i in 0..n {
            for j in 2..n - 2 {
                let p = p_axis.at(j);
                // fourth-order first and second derivative stencils
                let b = e1 * p / (24.0 * dp);
                let d12 = d / 12.0;
                let (advect, diffuse, center) = match fpt {
                    FPType::None => ([0.0; 5], [0.0; 5], 1.0),
                    FPType::DampingOnly => (
                        [b, -8.0 * b, 0.0, 8.0 * b, -b],
                        [0.0; 5],
                        1.0 + e1 / 2.0,
                    ),
                    FPType::DiffusionOnly => (
                        [0.0; 5],
                        [-d12, 16.0 * d12, -30.0 * d12, 16.0 * d12, -d12],
                        1.0,
                    ),
                    FPType::Full => (
                        [b, -8.0 * b, 0.0, 8.0 * b, -b],
                        [-d12, 16.0 * d12, -30.0 * d12, 16.0 * d12, -d12],
                        1.0 + e1 / 2.0,
                    ),
                };
                let base = i * n + j;
                let stencil = table.stencil_mut(base);
                for (k, item) in stencil.iter_mut().enumerate() {
                    let src = base as isize + k as isize - 2;
                    let mut w = advect[k] + diffuse[k];
                    if k == 2 {
                        w += center;
                    }
                    *item = MapWeight {
                        src: src as u32,
                        weight: w,
                    };
                }
            }
            // two absorbing rows per edge for the wide stencil
        }
    }
}

impl SourceMap for FokkerPlanckMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        check_geometry(input, output)?;
        let (src, dst) = (input.as_slice(), output.as_slice_mut());
        backend.apply_table(&self.table, src, dst)
    }

    /// Tracers follow the deterministic drift only: contraction toward
    /// the p-axis center at rate ε/2 per step.
    fn apply_to(&self, tracers: &mut [Position]) {
        if matches!(self.fpt, FPType::None | FPType::DiffusionOnly) {
            return;
        }
        let center = (self.n as f64 - 1.0) / 2.0;
        let factor = 1.0 - self.e1 / 2.0;
        for t in tracers.iter_mut() {
            t.y = center + (t.y - center) * factor;
        }
    }
}
