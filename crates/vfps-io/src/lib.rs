// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — IO
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! External collaborators of the engine: seed distributions and
//! tracers read from files, snapshots written to npz archives with a
//! JSON configuration sidecar.

pub mod input;
pub mod recorder;
