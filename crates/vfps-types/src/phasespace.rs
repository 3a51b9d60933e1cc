// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — PhaseSpace
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! The 2D charge-density mesh with cached projections and moments.
//!
//! Layout is row-major `[i_q, j_p]`: axis 0 is the longitudinal
//! position q (units of the natural bunch length σ₀), axis 1 the
//! energy deviation p (units of the natural energy spread σ_E).

use crate::error::{VfpsError, VfpsResult};
use crate::ruler::Ruler;
use ndarray::{Array1, Array2};

/// A tracer particle in fractional grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Charge density ρ(q, p) on a square mesh, plus the charge scale
/// needed to convert to physical units.
#[derive(Debug, Clone)]
pub struct PhaseSpace {
    data: Array2<f64>,
    q_axis: Ruler,
    p_axis: Ruler,
    /// Bunch charge Q_b (C).
    charge: f64,
    /// Bunch current I_b (A).
    current: f64,
    /// Natural RMS bunch length σ₀ (m).
    bunch_length: f64,
    /// Absolute energy spread σ_E (eV).
    energy_spread: f64,
    x_proj: Array1<f64>,
    y_proj: Array1<f64>,
    integral: f64,
    mean: [f64; 2],
    variance: [f64; 2],
}

impl PhaseSpace {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n: usize,
        qmin: f64,
        qmax: f64,
        pmin: f64,
        pmax: f64,
        charge: f64,
        current: f64,
        bunch_length: f64,
        energy_spread: f64,
    ) -> VfpsResult<Self> {
        let q_axis = Ruler::new(n, qmin, qmax)?;
        let p_axis = Ruler::new(n, pmin, pmax)?;
        Ok(PhaseSpace {
            data: Array2::zeros((n, n)),
            q_axis,
            p_axis,
            charge,
            current,
            bunch_length,
            energy_spread,
            x_proj: Array1::zeros(n),
            y_proj: Array1::zeros(n),
            integral: 0.0,
            mean: [0.0; 2],
            variance: [0.0; 2],
        })
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.q_axis.len()
    }

    /// Axis ruler: 0 = q, 1 = p.
    pub fn axis(&self, axis: usize) -> &Ruler {
        match axis {
            0 => &self.q_axis,
            _ => &self.p_axis,
        }
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn bunch_length(&self) -> f64 {
        self.bunch_length
    }

    pub fn energy_spread(&self) -> f64 {
        self.energy_spread
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// Contiguous view of the density samples.
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice().expect("mesh must be contiguous")
    }

    pub fn as_slice_mut(&mut self) -> &mut [f64] {
        self.data.as_slice_mut().expect("mesh must be contiguous")
    }

    /// Replace the density array. Shape must match the configured mesh.
    pub fn set_data(&mut self, data: Array2<f64>) -> VfpsResult<()> {
        let n = self.n();
        if data.dim() != (n, n) {
            return Err(VfpsError::InvalidGeometry(format!(
                "expected {n}x{n} density array, got {:?}",
                data.dim()
            )));
        }
        self.data = data.as_standard_layout().into_owned();
        Ok(())
    }

    /// Seed with a bi-Gaussian exp(−(q²+p²)/(2·zoom²)), normalized to
    /// unit integral.
    pub fn seed_gaussian(&mut self, zoom: f64) -> VfpsResult<()> {
        let z2 = if zoom > 0.0 { zoom * zoom } else { 1.0 };
        for ((i, j), v) in self.data.indexed_iter_mut() {
            let q = self.q_axis.at(i);
            let p = self.p_axis.at(j);
            *v = (-(q * q + p * p) / (2.0 * z2)).exp();
        }
        self.update_x_projection();
        self.normalize()?;
        Ok(())
    }

    /// Refresh the q-projection: px[i] = Σ_j ρ[i][j]·δp.
    pub fn update_x_projection(&mut self) {
        let dp = self.p_axis.delta();
        for (i, px) in self.x_proj.iter_mut().enumerate() {
            *px = self.data.row(i).sum() * dp;
        }
    }

    /// Refresh the p-projection: py[j] = Σ_i ρ[i][j]·δq.
    pub fn update_y_projection(&mut self) {
        let dq = self.q_axis.delta();
        for (j, py) in self.y_proj.iter_mut().enumerate() {
            *py = self.data.column(j).sum() * dq;
        }
    }

    pub fn x_projection(&self) -> &Array1<f64> {
        &self.x_proj
    }

    pub fn y_projection(&self) -> &Array1<f64> {
        &self.y_proj
    }

    /// Overwrite the q-projection (Haissinski seeding path).
    pub fn set_x_projection(&mut self, proj: &Array1<f64>) -> VfpsResult<()> {
        if proj.len() != self.n() {
            return Err(VfpsError::InvalidGeometry(format!(
                "projection length {} does not match mesh size {}",
                proj.len(),
                self.n()
            )));
        }
        self.x_proj.assign(proj);
        Ok(())
    }

    /// Rebuild ρ(q, p) = px(q)·exp(−p²/2)/√(2π) from the current
    /// q-projection.
    pub fn create_from_projection(&mut self) {
        let norm = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        for ((i, j), v) in self.data.indexed_iter_mut() {
            let p = self.p_axis.at(j);
            *v = self.x_proj[i] * (-0.5 * p * p).exp() * norm;
        }
    }

    /// Integrate the density from the cached q-projection.
    ///
    /// Fails with [`VfpsError::Numerical`] when the result is not
    /// finite, which aborts the run.
    pub fn integral(&mut self) -> VfpsResult<f64> {
        let dq = self.q_axis.delta();
        let total: f64 = self.x_proj.iter().sum::<f64>() * dq;
        if !total.is_finite() {
            return Err(VfpsError::Numerical(format!(
                "phase-space integral is {total}"
            )));
        }
        self.integral = total;
        Ok(total)
    }

    pub fn cached_integral(&self) -> f64 {
        self.integral
    }

    /// Rescale the density to unit integral. Returns the charge that
    /// was removed (or gained) relative to 1.
    pub fn normalize(&mut self) -> VfpsResult<f64> {
        let total = self.integral()?;
        if total <= 0.0 {
            return Err(VfpsError::Numerical(format!(
                "cannot normalize non-positive charge {total}"
            )));
        }
        let scale = 1.0 / total;
        self.data.mapv_inplace(|v| v * scale);
        self.x_proj.mapv_inplace(|v| v * scale);
        self.y_proj.mapv_inplace(|v| v * scale);
        self.integral = 1.0;
        Ok(total - 1.0)
    }

    /// Mean and variance along `axis` from the matching projection.
    /// The projection must be current.
    pub fn update_moments(&mut self, axis: usize) -> f64 {
        let (proj, ruler) = match axis {
            0 => (&self.x_proj, &self.q_axis),
            _ => (&self.y_proj, &self.p_axis),
        };
        let d = ruler.delta();
        let w: f64 = proj.iter().sum::<f64>() * d;
        if w <= 0.0 {
            self.mean[axis.min(1)] = 0.0;
            self.variance[axis.min(1)] = 0.0;
            return 0.0;
        }
        let mut mean = 0.0;
        for (i, &p) in proj.iter().enumerate() {
            mean += ruler.at(i) * p * d;
        }
        mean /= w;
        let mut var = 0.0;
        for (i, &p) in proj.iter().enumerate() {
            let dx = ruler.at(i) - mean;
            var += dx * dx * p * d;
        }
        var /= w;
        self.mean[axis.min(1)] = mean;
        self.variance[axis.min(1)] = var;
        var
    }

    pub fn mean(&self, axis: usize) -> f64 {
        self.mean[axis.min(1)]
    }

    pub fn variance(&self, axis: usize) -> f64 {
        self.variance[axis.min(1)]
    }

    pub fn sigma(&self, axis: usize) -> f64 {
        self.variance[axis.min(1)].max(0.0).sqrt()
    }

    /// Largest density sample (display/diagnostic scale).
    pub fn max_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::MIN, f64::max)
    }
}
