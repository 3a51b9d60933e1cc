//! Wake kicks: the collective energy change per turn as a
//! displacement along p.
//!
//! Two flavors share the kick mechanics and differ in where the
//! per-column displacement comes from: the wake-potential map reads
//! it from the electric field, the wake-function map convolves the
//! charge profile with a tabulated single-particle wake.

use crate::backend::Backend;
use crate::field::ElectricField;
use crate::kick::{KickAxis, KickMap};
use crate::sourcemap::SourceMap;
use std::path::Path;
use vfps_math::interp::InterpolationOrder;
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

/// Converts a wake in eV per turn into p-cells per step.
#[derive(Debug, Clone, Copy)]
pub struct WakeScaling {
    /// Revolutions per simulation step, f₀·Δt.
    pub revolution_part: f64,
    /// Absolute energy spread σ_E (eV).
    pub energy_spread: f64,
    /// p-axis cell size (units of σ_E).
    pub p_delta: f64,
}

impl WakeScaling {
    #[inline]
    pub fn cells_per_ev(&self) -> f64 {
        self.revolution_part / (self.energy_spread * self.p_delta)
    }
}

/// Kick from the self-consistent wake potential of the field.
pub struct WakePotentialMap {
    kick: KickMap,
    scaling: WakeScaling,
}

impl WakePotentialMap {
    pub fn new(
        n: usize,
        order: InterpolationOrder,
        clamp: bool,
        scaling: WakeScaling,
    ) -> Self {
        WakePotentialMap {
            kick: KickMap::new(n, KickAxis::AlongP, order, clamp),
            scaling,
        }
    }

    /// Recompute the displacement table from the current charge
    /// profile. The mesh's q-projection must be current.
    pub fn update(&mut self, mesh: &PhaseSpace, field: &mut ElectricField) -> VfpsResult<()> {
        field.update(mesh);
        let per_ev = self.scaling.cells_per_ev();
        let offsets: Vec<f64> = field
            .wake_potential()
            .iter()
            .map(|w| w * per_ev)
            .collect();
        self.kick.set_offsets(&offsets)
    }

    /// Current displacement per q column, in p cells.
    pub fn force(&self) -> &[f64] {
        self.kick.offsets()
    }
}

impl SourceMap for WakePotentialMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        self.kick.apply(input, output, backend)
    }

    fn apply_to(&self, tracers: &mut [Position]) {
        self.kick.apply_to(tracers)
    }
}

/// Kick from a tabulated wake function W(q), convolved with the
/// charge profile each step.
pub struct WakeFunctionMap {
    kick: KickMap,
    /// Kernel sampled at cell offsets −n..n−1, eV per turn per unit
    /// normalized charge.
    kernel: Vec<f64>,
    scaling: WakeScaling,
}

impl WakeFunctionMap {
    /// Load W(q) from whitespace rows `q  W` (q in σ₀ units, W in
    /// volts per coulomb), resampled onto cell offsets.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        mesh: &PhaseSpace,
        order: InterpolationOrder,
        clamp: bool,
        scaling: WakeScaling,
    ) -> VfpsResult<Self> {
        let contents = std::fs::read_to_string(&path)?;
        let mut rows: Vec<(f64, f64)> = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            let mut parse = |what: &str| -> VfpsResult<f64> {
                parts
                    .next()
                    .ok_or_else(|| {
                        VfpsError::Format(format!(
                            "wake file line {}: missing {what}",
                            lineno + 1
                        ))
                    })?
                    .parse::<f64>()
                    .map_err(|e| {
                        VfpsError::Format(format!("wake file line {}: {e}", lineno + 1))
                    })
            };
            let q = parse("position")?;
            let w = parse("wake value")?;
            rows.push((q, w));
        }
        if rows.len() < 2 {
            return Err(VfpsError::Format(
                "wake file needs at least two rows".to_string(),
            ));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = mesh.n();
        let dq = mesh.axis(0).delta();
        let charge = mesh.charge();
        let mut kernel = vec![0.0; 2 * n];
        for (m, k) in kernel.iter_mut().enumerate() {
            let q = (m as f64 - n as f64) * dq;
            if q < rows[0].0 || q > rows[rows.len() - 1].0 {
                continue;
            }
            let hi = rows.partition_point(|r| r.0 < q).min(rows.len() - 1).max(1);
            let (q0, w0) = rows[hi - 1];
            let (q1, w1) = rows[hi];
            let t = if q1 > q0 { (q - q0) / (q1 - q0) } else { 0.0 };
            // volts/C → eV per turn for the whole bunch charge
            *k = (w0 * (1.0 - t) + w1 * t) * charge;
        }

        Ok(WakeFunctionMap {
            kick: KickMap::new(n, KickAxis::AlongP, order, clamp),
            kernel,
            scaling,
        })
    }

    /// Direct kernel constructor for tests and programmatic use.
    pub fn from_kernel(
        kernel: Vec<f64>,
        n: usize,
        order: InterpolationOrder,
        clamp: bool,
        scaling: WakeScaling,
    ) -> VfpsResult<Self> {
        if kernel.len() != 2 * n {
            return Err(VfpsError::InvalidGeometry(format!(
                "wake kernel needs 2N = {} samples, got {}",
                2 * n,
                kernel.len()
            )));
        }
        Ok(WakeFunctionMap {
            kick: KickMap::new(n, KickAxis::AlongP, order, clamp),
            kernel,
            scaling,
        })
    }

    pub fn force(&self) -> &[f64] {
        self.kick.offsets()
    }
}

impl SourceMap for WakeFunctionMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        self.kick.apply(input, output, backend)
    }

    fn apply_to(&self, tracers: &mut [Position]) {
        self.kick.apply_to(tracers)
    }

    /// Convolve the q-projection with the tabulated wake.
    fn update(&mut self, mesh: &PhaseSpace) -> VfpsResult<()> {
        let n = mesh.n();
        let dq = mesh.axis(0).delta();
        let proj = mesh.x_projection();
        let per_ev = self.scaling.cells_per_ev();
        let mut offsets = vec![0.0; n];
        for (i, o) in offsets.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, &p) in proj.iter().enumerate() {
                acc += p * self.kernel[i + n - j];
            }
            *o = acc * dq * per_ev;
        }
        self.kick.set_offsets(&offsets)
    }
}

/// The wake kick actually wired into the evolution loop.
pub enum WakeKick {
    Potential(WakePotentialMap),
    Function(WakeFunctionMap),
}

impl WakeKick {
    pub fn update(
        &mut self,
        mesh: &PhaseSpace,
        field: &mut ElectricField,
    ) -> VfpsResult<()> {
        match self {
            WakeKick::Potential(map) => map.update(mesh, field),
            WakeKick::Function(map) => map.update(mesh),
        }
    }

    pub fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        match self {
            WakeKick::Potential(map) => map.apply(input, output, backend),
            WakeKick::Function(map) => map.apply(input, output, backend),
        }
    }

    pub fn apply_to(&self, tracers: &mut [Position]) {
        match self {
            WakeKick::Potential(map) => map.apply_to(tracers),
            WakeKick::Function(map) => map.apply_to(tracers),
        }
    }

    pub fn force(&self) -> &[f64] {
        match self {
            WakeKick::Potential(map) => map.force(),
            WakeKick::Function(map) => map.force(),
        }
    }
}
