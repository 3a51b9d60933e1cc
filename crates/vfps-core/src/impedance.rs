// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Impedance
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Coupling impedance Z(f) on a uniform frequency grid.
//!
//! Bin k sits at `k·δf` with `δf = f_max/n`, matching the DFT grid of
//! the wake convolution. Models compose additively when they share
//! the grid.

use num_complex::Complex64;
use std::ops::{Add, AddAssign};
use std::path::Path;
use vfps_math::special::airy_scaled;
use vfps_types::constants::{C_LIGHT, MU0_SI, Z0_VACUUM};
use vfps_types::error::{VfpsError, VfpsResult};

/// Mode-sum terms below this weight are dropped.
const PP_MODE_CUTOFF: f64 = 400.0;

/// Per-turn free-space CSR impedance prefactor:
/// Z0·Γ(2/3)/3^(1/3)·e^(iπ/6).
const FREE_SPACE_FACTOR: Complex64 = Complex64::new(306.3, 176.9);

#[derive(Debug, Clone)]
pub struct Impedance {
    values: Vec<Complex64>,
    delta_f: f64,
}

impl Impedance {
    /// Wrap an explicit spectrum covering `[0, f_max)` in `n` bins.
    pub fn from_spectrum(values: Vec<Complex64>, f_max: f64) -> VfpsResult<Self> {
        if values.len() < 2 || f_max <= 0.0 {
            return Err(VfpsError::InvalidGeometry(format!(
                "impedance needs at least 2 bins and a positive f_max, got {} / {f_max}",
                values.len()
            )));
        }
        let delta_f = f_max / values.len() as f64;
        Ok(Impedance { values, delta_f })
    }

    pub fn n_freqs(&self) -> usize {
        self.values.len()
    }

    pub fn delta_f(&self) -> f64 {
        self.delta_f
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    #[inline]
    pub fn at(&self, k: usize) -> Complex64 {
        self.values[k]
    }

    /// Frequency of bin k.
    #[inline]
    pub fn frequency(&self, k: usize) -> f64 {
        k as f64 * self.delta_f
    }

    /// Free-space CSR impedance: Z(f) = Z_fs·(f/f₀)^(1/3).
    pub fn free_space_csr(n: usize, f0: f64, f_max: f64) -> VfpsResult<Self> {
        let delta_f = f_max / n as f64;
        let values = (0..n)
            .map(|k| {
                let f = k as f64 * delta_f;
                FREE_SPACE_FACTOR * (f / f0).cbrt()
            })
            .collect();
        Self::from_spectrum(values, f_max)
    }

    /// Shielded CSR impedance between parallel plates with full gap
    /// `gap`, as the Airy mode sum over the odd image modes.
    pub fn parallel_plates_csr(n: usize, f0: f64, f_max: f64, gap: f64) -> VfpsResult<Self> {
        if gap <= 0.0 {
            return Err(VfpsError::Parse(format!(
                "parallel plates need a positive gap, got {gap}"
            )));
        }
        let r_bend = C_LIGHT / (2.0 * std::f64::consts::PI * f0);
        let delta_f = f_max / n as f64;
        let prefactor = Z0_VACUUM * 4.0 * std::f64::consts::PI.powi(2) * r_bend / gap;
        let values = (0..n)
            .map(|k| {
                let harmonic = k as f64 * delta_f / f0;
                if harmonic <= 0.0 {
                    return Complex64::new(0.0, 0.0);
                }
                let scale = (2.0 / harmonic).cbrt();
                let u_scale = std::f64::consts::PI * r_bend
                    / (gap * (2.0 * harmonic * harmonic).cbrt());
                let mut sum = Complex64::new(0.0, 0.0);
                let mut p = 0u32;
                loop {
                    let u = (2 * p + 1) as f64 * u_scale;
                    let x = u * u;
                    if x > PP_MODE_CUTOFF {
                        break;
                    }
                    let airy = airy_scaled(x);
                    let damp = (-2.0 * airy.zeta).exp();
                    // F(u) = Ai'·(Ai' − i·Bi') + u²·Ai·(Ai − i·Bi)
                    let re = damp * (airy.aip * airy.aip + x * airy.ai * airy.ai);
                    let im = -(airy.aip * airy.bip + x * airy.ai * airy.bi);
                    sum += Complex64::new(re, im);
                    p += 1;
                    if p > 4096 {
                        break;
                    }
                }
                prefactor * scale * sum
            })
            .collect();
        Self::from_spectrum(values, f_max)
    }

    /// Resistive-wall impedance of a chamber with half gap `half_gap`,
    /// conductivity `sigma_c` and susceptibility `chi`: √f scaling.
    pub fn resistive_wall(
        n: usize,
        f0: f64,
        f_max: f64,
        sigma_c: f64,
        chi: f64,
        half_gap: f64,
    ) -> VfpsResult<Self> {
        if sigma_c <= 0.0 || half_gap <= 0.0 || chi < -1.0 {
            return Err(VfpsError::Parse(format!(
                "resistive wall needs σ_c > 0, half gap > 0 and χ ≥ −1 \
                 (got {sigma_c}, {half_gap}, {chi})"
            )));
        }
        let r_bend = C_LIGHT / (2.0 * std::f64::consts::PI * f0);
        let delta_f = f_max / n as f64;
        let values = (0..n)
            .map(|k| {
                let f = k as f64 * delta_f;
                let surface =
                    (std::f64::consts::PI * f * MU0_SI * (1.0 + chi) / sigma_c).sqrt();
                Complex64::new(1.0, -1.0) * (r_bend / half_gap) * surface
            })
            .collect();
        Self::from_spectrum(values, f_max)
    }

    /// Step-change collimator: frequency-independent geometric
    /// impedance Z = Z0/π·ln(half_gap/radius).
    pub fn collimator(n: usize, f_max: f64, half_gap: f64, radius: f64) -> VfpsResult<Self> {
        if radius <= 0.0 || half_gap <= radius {
            return Err(VfpsError::Parse(format!(
                "collimator radius must satisfy 0 < r < half gap, got r = {radius}, \
                 half gap = {half_gap}"
            )));
        }
        let z = Complex64::new(
            Z0_VACUUM / std::f64::consts::PI * (half_gap / radius).ln(),
            0.0,
        );
        Self::from_spectrum(vec![z; n], f_max)
    }

    /// Tabulated impedance: whitespace-separated rows of
    /// `f  Re Z  Im Z`, resampled onto the uniform grid by linear
    /// interpolation. Frequencies outside the table read as zero.
    pub fn from_file<P: AsRef<Path>>(path: P, n: usize, f_max: f64) -> VfpsResult<Self> {
        let contents = std::fs::read_to_string(&path)?;
        let mut rows: Vec<(f64, Complex64)> = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut parts = trimmed.split_whitespace();
            let parse = |field: Option<&str>| -> VfpsResult<f64> {
                field
                    .ok_or_else(|| {
                        VfpsError::Format(format!(
                            "impedance file line {}: expected 'f Re Im'",
                            lineno + 1
                        ))
                    })?
                    .parse::<f64>()
                    .map_err(|e| {
                        VfpsError::Format(format!(
                            "impedance file line {}: {e}",
                            lineno + 1
                        ))
                    })
            };
            let f = parse(parts.next())?;
            let re = parse(parts.next())?;
            let im = parse(parts.next())?;
            rows.push((f, Complex64::new(re, im)));
        }
        if rows.len() < 2 {
            return Err(VfpsError::Format(
                "impedance file needs at least two rows".to_string(),
            ));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let delta_f = f_max / n as f64;
        let values = (0..n)
            .map(|k| {
                let f = k as f64 * delta_f;
                if f < rows[0].0 || f > rows[rows.len() - 1].0 {
                    return Complex64::new(0.0, 0.0);
                }
                let hi = rows.partition_point(|r| r.0 < f).min(rows.len() - 1).max(1);
                let (f0r, z0) = rows[hi - 1];
                let (f1r, z1) = rows[hi];
                if f1r <= f0r {
                    return z0;
                }
                let t = (f - f0r) / (f1r - f0r);
                z0 * (1.0 - t) + z1 * t
            })
            .collect();
        Self::from_spectrum(values, f_max)
    }
}

impl AddAssign<&Impedance> for Impedance {
    fn add_assign(&mut self, other: &Impedance) {
        assert_eq!(
            self.values.len(),
            other.values.len(),
            "impedance grids must share the bin count"
        );
        assert!(
            (self.delta_f - other.delta_f).abs() <= 1e-9 * self.delta_f,
            "impedance grids must share the frequency step"
        );
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += b;
        }
    }
}

impl Add<&Impedance> for Impedance {
    type Output = Impedance;

    fn add(mut self, other: &Impedance) -> Impedance {
        self += other;
        self
    }
}
