// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Constants
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
/// Speed of light (m/s)
pub const C_LIGHT: f64 = 2.99792458e8;

/// Impedance of free space (Ohm)
pub const Z0_VACUUM: f64 = 376.730313668;

/// Elementary charge (C)
pub const Q_ELECTRON: f64 = 1.602176634e-19;

/// Electron rest energy (eV)
pub const E_REST_ELECTRON: f64 = 510998.95;

/// Alfvén current (A)
pub const I_ALFVEN: f64 = 17045.0;

/// Vacuum permeability (H/m)
pub const MU0_SI: f64 = 1.2566370614e-6;
