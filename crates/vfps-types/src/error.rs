// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Error
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfpsError {
    #[error("configuration error: {0}")]
    Parse(String),

    #[error("mesh geometry mismatch: {0}")]
    InvalidGeometry(String),

    #[error("unstable numerical parameters: {0}")]
    UnstableParameters(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("accelerator backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("data format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type VfpsResult<T> = Result<T, VfpsError>;
