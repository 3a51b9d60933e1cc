// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Config
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Simulation configuration: the full external surface of the engine.
//!
//! Loaded from JSON; every run writes the effective configuration back
//! out as a sidecar so results stay reproducible.

use crate::error::VfpsResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_run_name")]
    pub run_name: String,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub collective: CollectiveConfig,
    #[serde(default)]
    pub numerics: NumericsConfig,
    #[serde(default)]
    pub io: IoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Mesh cells per axis.
    pub size: usize,
    /// Full extent of each axis in natural units (σ₀ resp. σ_E).
    pub extent: f64,
    /// Mesh shift along q, in cells.
    #[serde(default)]
    pub shift_q: f64,
    /// Mesh shift along p, in cells.
    #[serde(default)]
    pub shift_p: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Simulation steps per synchrotron period.
    pub steps: u32,
    /// Number of synchrotron periods to simulate.
    pub rotations: f64,
    /// Steps between snapshots (0 = only the final one).
    pub outstep: u32,
    /// Steps between charge renormalizations (0 = never).
    #[serde(default)]
    pub renormalize: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Beam energy E₀ (eV).
    pub beam_energy: f64,
    /// Synchrotron frequency (Hz). Mutually exclusive with `alpha0`.
    #[serde(default)]
    pub sync_freq: Option<f64>,
    /// Linear momentum compaction α₀. Mutually exclusive with `sync_freq`.
    #[serde(default)]
    pub alpha0: Option<f64>,
    /// Quadratic momentum-compaction coefficient.
    #[serde(default)]
    pub alpha1: f64,
    /// Cubic momentum-compaction coefficient.
    #[serde(default)]
    pub alpha2: f64,
    /// RF harmonic number.
    pub harmonic: f64,
    /// RF peak voltage (V).
    pub rf_voltage: f64,
    /// Revolution frequency (Hz).
    pub rev_freq: f64,
    /// Bending radius (m); 0 derives it from the revolution frequency.
    #[serde(default)]
    pub bending_radius: f64,
    /// Bunch current I_b (A).
    pub bunch_current: f64,
    /// Longitudinal damping time (s); 0 disables damping and diffusion.
    #[serde(default)]
    pub damping_time: f64,
    /// Relative natural energy spread σ_E/E₀.
    pub energy_spread: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectiveConfig {
    /// Full vacuum-chamber gap (m). 0 disables the wake kick;
    /// negative selects the free-space model with the kick enabled.
    #[serde(default)]
    pub gap: f64,
    /// Wall conductivity (S/m); 0 disables the resistive-wall term.
    #[serde(default)]
    pub wall_conductivity: f64,
    /// Wall magnetic susceptibility χ; values below −1 disable the term.
    #[serde(default = "default_susceptibility")]
    pub wall_susceptibility: f64,
    /// Collimator radius (m); 0 disables the collimator term.
    #[serde(default)]
    pub collimator_radius: f64,
    /// Tabulated impedance file; overrides the analytic models.
    #[serde(default)]
    pub impedance_file: Option<PathBuf>,
    /// Tabulated wake-function file; selects the wake-function kick.
    #[serde(default)]
    pub wake_file: Option<PathBuf>,
    /// Detector cutoff frequency for the CSR power monitor (Hz).
    #[serde(default)]
    pub cutoff_freq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Recompute source coordinates per cell per step.
    OnTheFly,
    /// Precompute the full weight table once.
    Precomputed,
    /// RF-kick + drift split integrator.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationOrder {
    /// 3-point Fokker–Planck stencil.
    Linear,
    /// 5-point Fokker–Planck stencil.
    Cubic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericsConfig {
    /// Lagrange interpolation order: 1, 3 or 5.
    pub interpolation: u8,
    /// Bound interpolated values to the local stencil range.
    #[serde(default)]
    pub clamp: bool,
    /// Zero-padding factor for the wake convolution (≥ 1).
    pub padding: usize,
    pub rotation: RotationStrategy,
    pub derivation: DerivationOrder,
    /// Haissinski fixed-point iterations before the run.
    #[serde(default)]
    pub haissinski: u32,
    /// Zoom factor of the internally generated Gaussian seed.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoConfig {
    /// Initial-distribution file (text pairs or npz); absent = Gaussian.
    #[serde(default)]
    pub start_dist: Option<PathBuf>,
    /// Step index to load from an npz start distribution.
    #[serde(default)]
    pub start_dist_step: usize,
    /// Tracer-particle coordinate file.
    #[serde(default)]
    pub tracker: Option<PathBuf>,
    /// Output archive basename; absent = no persistent output.
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Dump the full 2D density with every snapshot.
    #[serde(default)]
    pub save_phase_space: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_run_name() -> String {
    "vfps".to_string()
}

fn default_susceptibility() -> f64 {
    -2.0
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            size: 256,
            extent: 12.0,
            shift_q: 0.0,
            shift_p: 0.0,
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            steps: 4000,
            rotations: 5.0,
            outstep: 100,
            renormalize: 0,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        // ANKA-like storage ring.
        PhysicsConfig {
            beam_energy: 1.287e9,
            sync_freq: Some(8500.0),
            alpha0: None,
            alpha1: 0.0,
            alpha2: 0.0,
            harmonic: 184.0,
            rf_voltage: 1.5e6,
            rev_freq: 2.7158e6,
            bending_radius: 5.559,
            bunch_current: 1.0e-3,
            damping_time: 1.0e-2,
            energy_spread: 4.7e-4,
        }
    }
}

impl Default for CollectiveConfig {
    fn default() -> Self {
        CollectiveConfig {
            gap: 0.0,
            wall_conductivity: 0.0,
            wall_susceptibility: default_susceptibility(),
            collimator_radius: 0.0,
            impedance_file: None,
            wake_file: None,
            cutoff_freq: 0.0,
        }
    }
}

impl Default for NumericsConfig {
    fn default() -> Self {
        NumericsConfig {
            interpolation: 3,
            clamp: false,
            padding: 2,
            rotation: RotationStrategy::Precomputed,
            derivation: DerivationOrder::Linear,
            haissinski: 0,
            zoom: 1.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            run_name: default_run_name(),
            grid: GridConfig::default(),
            time: TimeConfig::default(),
            physics: PhysicsConfig::default(),
            collective: CollectiveConfig::default(),
            numerics: NumericsConfig::default(),
            io: IoConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> VfpsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Write the effective configuration as a reproducibility sidecar.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> VfpsResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
