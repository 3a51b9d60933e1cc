// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — SourceMap
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! Linear transport of mesh values.
//!
//! A source map stores, for every output cell, the input cells that
//! contribute to it together with their weights. The weight table is
//! a flat buffer addressed row-major; mesh buffers are borrowed for
//! the duration of `apply` and never kept across calls.

use crate::backend::Backend;
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

/// One contribution to an output cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapWeight {
    pub src: u32,
    pub weight: f64,
}

/// Flat per-output-cell stencil table of fixed width.
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: Vec<MapWeight>,
    width: usize,
    cells: usize,
    clamp: bool,
}

impl WeightTable {
    pub fn new(cells: usize, width: usize, clamp: bool) -> Self {
        WeightTable {
            weights: vec![MapWeight::default(); cells * width],
            width,
            cells,
            clamp,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.cells
    }

    #[inline]
    pub fn clamped(&self) -> bool {
        self.clamp
    }

    pub fn weights(&self) -> &[MapWeight] {
        &self.weights
    }

    /// Mutable stencil slice of one output cell.
    #[inline]
    pub fn stencil_mut(&mut self, cell: usize) -> &mut [MapWeight] {
        let start = cell * self.width;
        &mut self.weights[start..start + self.width]
    }

    #[inline]
    pub fn stencil(&self, cell: usize) -> &[MapWeight] {
        let start = cell * self.width;
        &self.weights[start..start + self.width]
    }

    /// Gather the value of one output cell from `input`.
    ///
    /// With clamping, the result is bounded below by zero and above by
    /// the largest contributing sample.
    #[inline]
    pub fn gather(&self, cell: usize, input: &[f64]) -> f64 {
        let mut acc = 0.0;
        let mut hi = f64::MIN;
        let mut any = false;
        for t in self.stencil(cell) {
            if t.weight != 0.0 {
                let v = input[t.src as usize];
                acc += t.weight * v;
                if v > hi {
                    hi = v;
                }
                any = true;
            }
        }
        if self.clamp {
            if any {
                acc.max(0.0).min(hi)
            } else {
                0.0
            }
        } else {
            acc
        }
    }

    /// Sum of the stencil weights of one output cell.
    pub fn weight_sum(&self, cell: usize) -> f64 {
        self.stencil(cell).iter().map(|t| t.weight).sum()
    }
}

/// Transport from an input mesh to an output mesh.
///
/// `apply` reads `input` and overwrites `output`; the two must be
/// distinct buffers (the evolution loop guarantees this). `apply_to`
/// advances tracer particles through the same transformation.
/// `update` refreshes internal state from the current charge profile
/// and is a no-op for stationary maps.
pub trait SourceMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()>;

    fn apply_to(&self, tracers: &mut [Position]);

    fn update(&mut self, _input: &PhaseSpace) -> VfpsResult<()> {
        Ok(())
    }
}

/// Verify that two meshes share the same square size.
pub(crate) fn check_geometry(input: &PhaseSpace, output: &PhaseSpace) -> VfpsResult<()> {
    if input.n() != output.n() {
        let n_in = input.n();
        let n_out = output.n();
        return Err(VfpsError::InvalidGeometry(format!(
            "input mesh is {n_in}x{n_in}, output mesh is {n_out}x{n_out}"
        )));
    }
    Ok(())
}

/// The identity transport. Stands in when a physical effect is
/// disabled so the buffer chain stays uniform.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMap;

impl SourceMap for IdentityMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        _backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        check_geometry(input, output)?;
        output.data_mut().assign(input.data());
        Ok(())
    }

    fn apply_to(&self, _tracers: &mut [Position]) {}
}
