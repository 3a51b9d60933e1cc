// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — ElectricField
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Collective field from the charge profile and an impedance.
//!
//! The longitudinal profile is zero-padded, transformed, multiplied
//! by the impedance spectrum (hermitian-extended so the convolution
//! kernel of a causal impedance stays causal), and transformed back
//! to yield the per-turn wake potential. Padding keeps the bunch tail
//! from wrapping into the bunch head.

use crate::impedance::Impedance;
use num_complex::Complex64;
use std::sync::Arc;
use vfps_math::fft::FftPair;
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::PhaseSpace;

pub struct ElectricField {
    fft: FftPair,
    n: usize,
    n_padded: usize,
    impedance: Arc<Impedance>,
    /// Forward transform of the padded charge profile.
    spectrum: Vec<Complex64>,
    product: Vec<Complex64>,
    /// Wake potential per q cell (eV per turn and unit charge ratio).
    wake: Vec<f64>,
    /// Q_b·δq·δf: spectrum bins → volts.
    volt_scaling: f64,
    /// 2·I_b·Q_b·δq²·δf: spectrum power → watts.
    power_scaling: f64,
    csr_power: f64,
}

impl ElectricField {
    /// `padding ≥ 1` multiplies the transform length beyond the mesh
    /// size. The impedance must cover the padded grid.
    pub fn new(
        mesh: &PhaseSpace,
        impedance: Arc<Impedance>,
        current: f64,
        padding: usize,
    ) -> VfpsResult<Self> {
        let n = mesh.n();
        let n_padded = n * padding.max(1);
        if impedance.n_freqs() < n_padded {
            return Err(VfpsError::InvalidGeometry(format!(
                "impedance covers {} bins, padded mesh needs {n_padded}",
                impedance.n_freqs()
            )));
        }
        let dq = mesh.axis(0).delta();
        let charge = mesh.charge();
        let delta_f = impedance.delta_f();
        Ok(ElectricField {
            fft: FftPair::new(n_padded),
            n,
            n_padded,
            impedance,
            spectrum: vec![Complex64::new(0.0, 0.0); n_padded],
            product: vec![Complex64::new(0.0, 0.0); n_padded],
            wake: vec![0.0; n],
            volt_scaling: charge * dq * delta_f,
            power_scaling: 2.0 * current * charge * dq * dq * delta_f,
            csr_power: 0.0,
        })
    }

    pub fn padded_len(&self) -> usize {
        self.n_padded
    }

    pub fn impedance(&self) -> &Impedance {
        &self.impedance
    }

    /// Refresh the charge spectrum from the mesh's q-projection.
    /// The projection must be current.
    pub fn update(&mut self, mesh: &PhaseSpace) {
        let proj = mesh.x_projection();
        self.fft
            .forward_padded(proj.as_slice().expect("projection must be contiguous"), &mut self.spectrum);
    }

    pub fn spectrum(&self) -> &[Complex64] {
        &self.spectrum
    }

    /// Compute the wake potential from the current spectrum.
    ///
    /// Returns the per-cell energy change in eV per turn; negative
    /// values decelerate.
    pub fn wake_potential(&mut self) -> &[f64] {
        let n_pad = self.n_padded;
        let half = n_pad / 2;
        for k in 0..n_pad {
            // hermitian extension keeps the kernel real and causal
            let z = if k <= half {
                self.impedance.at(k)
            } else {
                self.impedance.at(n_pad - k).conj()
            };
            self.product[k] = self.spectrum[k] * z;
        }
        self.fft.inverse(&mut self.product);
        let scale = self.volt_scaling * n_pad as f64;
        for (w, c) in self.wake.iter_mut().zip(self.product.iter()) {
            *w = -scale * c.re;
        }
        &self.wake
    }

    pub fn wake(&self) -> &[f64] {
        &self.wake
    }

    /// Coherent radiated power from the current spectrum, with an
    /// optional detector high-pass at `cutoff` Hz.
    pub fn update_csr(&mut self, cutoff: f64) -> f64 {
        let half = self.n_padded / 2;
        let mut power = 0.0;
        for k in 1..=half {
            let f = self.impedance.frequency(k);
            let filter = if cutoff > 0.0 {
                let x = f / cutoff;
                x * x / (1.0 + x * x)
            } else {
                1.0
            };
            power += self.spectrum[k].norm_sqr() * self.impedance.at(k).re * filter;
        }
        self.csr_power = self.power_scaling * power;
        self.csr_power
    }

    pub fn csr_power(&self) -> f64 {
        self.csr_power
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with_peak(n: usize, center: usize, width: f64) -> PhaseSpace {
        let mut ps = PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-9, 1e-3, 1e-3, 600.0).unwrap();
        ps.data_mut().fill(0.0);
        for i in 0..n {
            let d = (i as f64 - center as f64) / width;
            let v = (-0.5 * d * d).exp();
            for j in 0..n {
                ps.data_mut()[[i, j]] = v;
            }
        }
        ps.update_x_projection();
        ps
    }

    /// Low-pass resonator: causal wake, decaying exponential behind
    /// the source.
    fn resonator(n: usize, f_max: f64, r_shunt: f64) -> Arc<Impedance> {
        let delta_f = f_max / n as f64;
        let f_r = 0.05 * f_max;
        let values = (0..n)
            .map(|k| {
                let f = k as f64 * delta_f;
                Complex64::new(r_shunt, 0.0) / Complex64::new(1.0, f / f_r)
            })
            .collect();
        Arc::new(Impedance::from_spectrum(values, f_max).unwrap())
    }

    #[test]
    fn test_spectrum_dc_is_total_charge_density() {
        let n = 64;
        let mesh = mesh_with_peak(n, 32, 3.0);
        let z = resonator(n * 2, 1.0e12, 100.0);
        let mut field = ElectricField::new(&mesh, z, 1e-3, 2).unwrap();
        field.update(&mesh);
        let dc = field.spectrum()[0];
        let sum: f64 = mesh.x_projection().iter().sum();
        assert!((dc.re - sum).abs() < 1e-9 * sum.abs().max(1.0));
        assert!(dc.im.abs() < 1e-12);
    }

    #[test]
    fn test_wake_decelerates_trailing_charge() {
        let n = 128;
        let center = 40;
        let mesh = mesh_with_peak(n, center, 2.0);
        let z = resonator(n * 2, 1.0e12, 1000.0);
        let mut field = ElectricField::new(&mesh, z, 1e-3, 2).unwrap();
        field.update(&mesh);
        let wake = field.wake_potential().to_vec();

        // Behind the peak (larger q): decelerating, i.e. negative.
        let behind: f64 = wake[center + 4..center + 30].iter().sum();
        assert!(behind < 0.0, "trailing wake should decelerate: {behind}");
        // Ahead of the peak the causal wake has died out.
        let ahead: f64 = wake[..center - 10].iter().map(|w| w.abs()).sum();
        assert!(
            ahead < 0.05 * behind.abs(),
            "wake ahead of the source: {ahead} vs {behind}"
        );
    }

    #[test]
    fn test_padding_prevents_wraparound() {
        let n = 64;
        // peak near the tail end of the mesh
        let mesh = mesh_with_peak(n, 56, 2.0);
        let z = resonator(n * 4, 1.0e12, 1000.0);
        let mut field = ElectricField::new(&mesh, z, 1e-3, 4).unwrap();
        field.update(&mesh);
        let wake = field.wake_potential().to_vec();
        // the head of the mesh must stay clean
        let head: f64 = wake[..16].iter().map(|w| w.abs()).sum();
        let peak = wake.iter().map(|w| w.abs()).fold(0.0, f64::max);
        assert!(head < 0.02 * peak * 16.0, "tail wrapped into head");
    }

    #[test]
    fn test_csr_power_scales_with_charge_squared() {
        let n = 64;
        let mesh1 = mesh_with_peak(n, 32, 3.0);
        let mut mesh2 = mesh_with_peak(n, 32, 3.0);
        // same shape, three times the charge density
        mesh2.data_mut().mapv_inplace(|v| 3.0 * v);
        mesh2.update_x_projection();

        let z = resonator(n * 2, 1.0e12, 500.0);
        let mut f1 = ElectricField::new(&mesh1, z.clone(), 1e-3, 2).unwrap();
        let mut f2 = ElectricField::new(&mesh2, z, 1e-3, 2).unwrap();
        f1.update(&mesh1);
        f2.update(&mesh2);
        let p1 = f1.update_csr(0.0);
        let p2 = f2.update_csr(0.0);
        assert!(p1 > 0.0);
        assert!((p2 / p1 - 9.0).abs() < 1e-6, "P ratio = {}", p2 / p1);
    }

    #[test]
    fn test_cutoff_filter_reduces_power() {
        let n = 64;
        let mesh = mesh_with_peak(n, 32, 3.0);
        let z = resonator(n * 2, 1.0e12, 500.0);
        let mut field = ElectricField::new(&mesh, z, 1e-3, 2).unwrap();
        field.update(&mesh);
        let open = field.update_csr(0.0);
        let filtered = field.update_csr(1.0e11);
        assert!(filtered < open);
        assert!(filtered > 0.0);
    }

    #[test]
    fn test_impedance_too_short_rejected() {
        let n = 64;
        let mesh = mesh_with_peak(n, 32, 3.0);
        let z = resonator(n, 1.0e12, 100.0);
        assert!(matches!(
            ElectricField::new(&mesh, z, 1e-3, 2),
            Err(VfpsError::InvalidGeometry(_))
        ));
    }
}
