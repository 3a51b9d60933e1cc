// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Parameter Derivation
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Physical inputs → dimensionless engine parameters.
//!
//! The ring is treated in the isomagnetic approximation: when a
//! bending radius is given the magnetic revolution frequency
//! f₀ = c/(2πR) replaces the true one, and currents, harmonic number
//! and damping time are rescaled by isoscale = f_rev/f₀ ≤ 1.

use serde::Serialize;
use vfps_types::config::SimulationConfig;
use vfps_types::constants::{C_LIGHT, E_REST_ELECTRON, I_ALFVEN};
use vfps_types::error::{VfpsError, VfpsResult};

#[derive(Debug, Clone, Serialize)]
pub struct DerivedParams {
    /// Magnetic revolution frequency (Hz).
    pub f0: f64,
    /// Bending radius (m).
    pub r_bend: f64,
    /// f_rev/f₀.
    pub isoscale: f64,
    /// Synchrotron frequency, isomagnetic ring (Hz).
    pub fs: f64,
    /// Synchrotron frequency, real ring (Hz).
    pub fs_unscaled: f64,
    /// Linear momentum compaction.
    pub alpha0: f64,
    /// Absolute energy spread σ_E (eV).
    pub energy_spread: f64,
    /// Natural RMS bunch length σ₀ (m).
    pub bunch_length: f64,
    /// Bunch charge Q_b (C).
    pub charge: f64,
    /// Bunch current in the isomagnetic ring (A).
    pub current: f64,
    /// Simulation time step (s).
    pub dt: f64,
    /// Rotation angle per step (rad); 2π is one synchrotron period.
    pub angle: f64,
    /// Revolutions per simulation step.
    pub revolution_part: f64,
    /// Scaled damping time (s).
    pub damping_time: f64,
    /// Fokker–Planck damping increment ε = 2Δt/t_d per step.
    pub e1: f64,
    /// Unscaled synchrotron period (s), the output time unit.
    pub t_sync: f64,
    pub total_steps: u64,
    /// Axis bounds in natural units.
    pub qmin: f64,
    pub qmax: f64,
    pub pmin: f64,
    pub pmax: f64,
    /// Top of the impedance frequency grid (Hz).
    pub f_max: f64,
    /// Shielding parameter σ₀·√R/g^(3/2).
    pub shielding: f64,
    /// CSR strength S = I/I_norm.
    pub csr_strength: f64,
    /// Scaling-law bursting threshold current (A).
    pub threshold_current: f64,
}

impl DerivedParams {
    pub fn from_config(cfg: &SimulationConfig) -> VfpsResult<Self> {
        let phys = &cfg.physics;
        for (name, value) in [
            ("beam_energy", phys.beam_energy),
            ("harmonic", phys.harmonic),
            ("rf_voltage", phys.rf_voltage),
            ("rev_freq", phys.rev_freq),
            ("energy_spread", phys.energy_spread),
        ] {
            if value <= 0.0 {
                return Err(VfpsError::Parse(format!("{name} must be positive, got {value}")));
            }
        }
        if cfg.grid.size < 4 {
            return Err(VfpsError::Parse(format!(
                "mesh size must be at least 4, got {}",
                cfg.grid.size
            )));
        }
        if cfg.grid.extent <= 0.0 {
            return Err(VfpsError::Parse(format!(
                "grid extent must be positive, got {}",
                cfg.grid.extent
            )));
        }
        if cfg.numerics.padding < 1 {
            return Err(VfpsError::Parse(
                "padding factor must be at least 1".to_string(),
            ));
        }

        let e0 = phys.beam_energy;
        let energy_spread = phys.energy_spread * e0;

        let (r_bend, f0) = if phys.bending_radius > 0.0 {
            let r = phys.bending_radius;
            (r, C_LIGHT / (2.0 * std::f64::consts::PI * r))
        } else {
            let r = C_LIGHT / (2.0 * std::f64::consts::PI * phys.rev_freq);
            (r, phys.rev_freq)
        };
        let isoscale = phys.rev_freq / f0;
        let harmonic = isoscale * phys.harmonic;

        // Synchrotron frequency and momentum compaction determine each
        // other; exactly one may be given.
        let (fs_unscaled, alpha0) = match (phys.sync_freq, phys.alpha0) {
            (Some(fs), None) if fs > 0.0 => {
                let a0 = 2.0 * std::f64::consts::PI * e0 / (phys.harmonic * phys.rf_voltage)
                    * (fs / phys.rev_freq).powi(2);
                (fs, a0)
            }
            (None, Some(a0)) if a0 > 0.0 => {
                let fs = phys.rev_freq
                    * (a0 * phys.harmonic * phys.rf_voltage
                        / (2.0 * std::f64::consts::PI * e0))
                        .sqrt();
                (fs, a0)
            }
            (Some(_), Some(_)) => {
                return Err(VfpsError::Parse(
                    "sync_freq and alpha0 are mutually exclusive; give exactly one".to_string(),
                ));
            }
            _ => {
                return Err(VfpsError::Parse(
                    "either sync_freq or alpha0 must be given and positive".to_string(),
                ));
            }
        };
        let fs = fs_unscaled / isoscale;

        // natural RMS bunch length
        let bunch_length =
            C_LIGHT * energy_spread / harmonic / f0.powi(2) / phys.rf_voltage * fs;

        let charge = phys.bunch_current / phys.rev_freq;
        let current = phys.bunch_current / isoscale;

        let steps = cfg.time.steps.max(1);
        let dt = 1.0 / (fs * steps as f64);
        let revolution_part = f0 * dt;
        let angle = 2.0 * std::f64::consts::PI / steps as f64;
        let damping_time = isoscale * phys.damping_time;
        let e1 = if damping_time > 0.0 {
            2.0 / (fs * damping_time * steps as f64)
        } else {
            0.0
        };
        let total_steps = (steps as f64 * cfg.time.rotations).ceil().max(1.0) as u64;

        let n = cfg.grid.size;
        let extent = cfg.grid.extent;
        let q_center = -cfg.grid.shift_q * extent / (n as f64 - 1.0);
        let p_center = -cfg.grid.shift_p * extent / (n as f64 - 1.0);
        let half = extent / 2.0;
        let (qmin, qmax) = (q_center - half, q_center + half);
        let (pmin, pmax) = (p_center - half, p_center + half);

        let f_max = n as f64 * C_LIGHT / (2.0 * qmax * bunch_length);

        let gap = cfg.collective.gap;
        let mut shielding = 0.0;
        let mut csr_strength = 0.0;
        let mut threshold_current = 0.0;
        if gap != 0.0 {
            if gap > 0.0 {
                shielding = bunch_length * r_bend.sqrt() * gap.powf(-1.5);
            }
            let i_norm = I_ALFVEN / E_REST_ELECTRON * 2.0 * std::f64::consts::PI
                * (energy_spread * fs / f0).powi(2)
                / phys.rf_voltage
                / harmonic
                * (bunch_length / r_bend).powf(1.0 / 3.0);
            threshold_current = i_norm * (0.5 + 0.34 * shielding);
            csr_strength = current / i_norm;
        }

        Ok(DerivedParams {
            f0,
            r_bend,
            isoscale,
            fs,
            fs_unscaled,
            alpha0,
            energy_spread,
            bunch_length,
            charge,
            current,
            dt,
            angle,
            revolution_part,
            damping_time,
            e1,
            t_sync: 1.0 / fs_unscaled,
            total_steps,
            qmin,
            qmax,
            pmin,
            pmax,
            f_max,
            shielding,
            csr_strength,
            threshold_current,
        })
    }

    /// Per-step rotation offset in cells; values ≥ 1 are unstable.
    pub fn rotation_offset(&self, n: usize) -> f64 {
        self.angle.tan().abs() * n as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfps_types::config::SimulationConfig;

    #[test]
    fn test_default_config_derives() {
        let cfg = SimulationConfig::default();
        let p = DerivedParams::from_config(&cfg).unwrap();
        assert!(p.isoscale > 0.0 && p.isoscale <= 1.0);
        assert!(p.fs > 0.0);
        assert!(p.alpha0 > 0.0);
        assert!(p.bunch_length > 1e-5 && p.bunch_length < 0.1);
        assert!(p.angle > 0.0);
        assert_eq!(
            p.total_steps,
            (cfg.time.steps as f64 * cfg.time.rotations) as u64
        );
        // charge from current and revolution frequency
        let expected_q = cfg.physics.bunch_current / cfg.physics.rev_freq;
        assert!((p.charge - expected_q).abs() < 1e-18);
    }

    #[test]
    fn test_alpha0_and_sync_freq_are_inverses() {
        let mut cfg = SimulationConfig::default();
        let p1 = DerivedParams::from_config(&cfg).unwrap();
        cfg.physics.sync_freq = None;
        cfg.physics.alpha0 = Some(p1.alpha0);
        let p2 = DerivedParams::from_config(&cfg).unwrap();
        assert!(
            (p1.fs_unscaled - p2.fs_unscaled).abs() < 1e-6 * p1.fs_unscaled,
            "fs mismatch: {} vs {}",
            p1.fs_unscaled,
            p2.fs_unscaled
        );
    }

    #[test]
    fn test_both_given_is_an_error() {
        let mut cfg = SimulationConfig::default();
        cfg.physics.alpha0 = Some(1e-4);
        assert!(matches!(
            DerivedParams::from_config(&cfg),
            Err(VfpsError::Parse(_))
        ));
    }

    #[test]
    fn test_neither_given_is_an_error() {
        let mut cfg = SimulationConfig::default();
        cfg.physics.sync_freq = None;
        cfg.physics.alpha0 = None;
        assert!(matches!(
            DerivedParams::from_config(&cfg),
            Err(VfpsError::Parse(_))
        ));
    }

    #[test]
    fn test_shielding_only_with_gap() {
        let mut cfg = SimulationConfig::default();
        cfg.collective.gap = 0.0;
        let p = DerivedParams::from_config(&cfg).unwrap();
        assert_eq!(p.shielding, 0.0);
        assert_eq!(p.csr_strength, 0.0);

        cfg.collective.gap = 0.03;
        let p = DerivedParams::from_config(&cfg).unwrap();
        assert!(p.shielding > 0.0);
        assert!(p.csr_strength > 0.0);
        assert!(p.threshold_current > 0.0);
    }

    #[test]
    fn test_grid_shift_moves_window() {
        let mut cfg = SimulationConfig::default();
        cfg.grid.shift_q = 2.0;
        let p = DerivedParams::from_config(&cfg).unwrap();
        assert!(p.qmin < -cfg.grid.extent / 2.0);
        assert!((p.qmax - p.qmin - cfg.grid.extent).abs() < 1e-12);
        assert!((p.pmax + p.pmin).abs() < 1e-12);
    }

    #[test]
    fn test_zero_damping_disables_fp() {
        let mut cfg = SimulationConfig::default();
        cfg.physics.damping_time = 0.0;
        let p = DerivedParams::from_config(&cfg).unwrap();
        assert_eq!(p.e1, 0.0);
    }
}
